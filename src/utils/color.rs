// CSS color strings as used in region styles

use image::Rgba;

/// Parse `#rgb`, `#rrggbb`, `#rrggbbaa`, `rgb(r, g, b)`, `rgba(r, g, b, a)`
/// and a handful of named colors. Alpha in `rgba()` is a 0..1 float.
pub fn parse_css_color(input: &str) -> Option<Rgba<u8>> {
    let s = input.trim().to_ascii_lowercase();

    if let Some(hex) = s.strip_prefix('#') {
        return parse_hex(hex);
    }

    if let Some(args) = s
        .strip_prefix("rgba(")
        .or_else(|| s.strip_prefix("rgb("))
        .and_then(|rest| rest.strip_suffix(')'))
    {
        let parts: Vec<&str> = args.split(',').map(str::trim).collect();
        let channel = |p: &str| p.parse::<f32>().ok().map(|v| v.round().clamp(0.0, 255.0) as u8);
        return match parts.as_slice() {
            [r, g, b] => Some(Rgba([channel(r)?, channel(g)?, channel(b)?, 255])),
            [r, g, b, a] => {
                let alpha = a.parse::<f32>().ok()?.clamp(0.0, 1.0);
                Some(Rgba([channel(r)?, channel(g)?, channel(b)?, (alpha * 255.0).round() as u8]))
            }
            _ => None,
        };
    }

    match s.as_str() {
        "black" => Some(Rgba([0, 0, 0, 255])),
        "white" => Some(Rgba([255, 255, 255, 255])),
        "red" => Some(Rgba([255, 0, 0, 255])),
        "green" => Some(Rgba([0, 128, 0, 255])),
        "blue" => Some(Rgba([0, 0, 255, 255])),
        "gray" | "grey" => Some(Rgba([128, 128, 128, 255])),
        "yellow" => Some(Rgba([255, 255, 0, 255])),
        "transparent" => Some(Rgba([0, 0, 0, 0])),
        _ => None,
    }
}

fn parse_hex(hex: &str) -> Option<Rgba<u8>> {
    if !hex.chars().all(|c| c.is_ascii_hexdigit()) {
        return None;
    }
    let byte = |i: usize| u8::from_str_radix(&hex[i..i + 2], 16).ok();
    let nibble = |i: usize| u8::from_str_radix(&hex[i..i + 1], 16).ok().map(|v| v * 17);

    match hex.len() {
        3 => Some(Rgba([nibble(0)?, nibble(1)?, nibble(2)?, 255])),
        6 => Some(Rgba([byte(0)?, byte(2)?, byte(4)?, 255])),
        8 => Some(Rgba([byte(0)?, byte(2)?, byte(4)?, byte(6)?])),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hex_colors() {
        assert_eq!(parse_css_color("#000000"), Some(Rgba([0, 0, 0, 255])));
        assert_eq!(parse_css_color("#fff"), Some(Rgba([255, 255, 255, 255])));
        assert_eq!(parse_css_color("#FF000080"), Some(Rgba([255, 0, 0, 128])));
        assert_eq!(parse_css_color("#12"), None);
        assert_eq!(parse_css_color("#gggggg"), None);
    }

    #[test]
    fn test_functional_colors() {
        assert_eq!(parse_css_color("rgba(255, 255, 255, 0.5)"), Some(Rgba([255, 255, 255, 128])));
        assert_eq!(parse_css_color("rgb(10,20,30)"), Some(Rgba([10, 20, 30, 255])));
        assert_eq!(parse_css_color("rgba(1, 2)"), None);
    }

    #[test]
    fn test_named_colors() {
        assert_eq!(parse_css_color(" White "), Some(Rgba([255, 255, 255, 255])));
        assert_eq!(parse_css_color("transparent").map(|c| c[3]), Some(0));
        assert_eq!(parse_css_color("chartreuse-ish"), None);
    }
}
