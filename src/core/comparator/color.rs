//! sRGB to CIE L*a*b* conversion and the CIEDE2000 color difference.
//!
//! L* is on the standard 0-100 scale, so a ΔE₀₀ of about 1 is the smallest
//! difference most observers notice.

/// CIE L*a*b* color (D65 reference white)
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Lab {
    /// Lightness (0-100)
    pub l: f64,
    /// Green-red axis
    pub a: f64,
    /// Blue-yellow axis
    pub b: f64,
}

// D65 reference white
const XN: f64 = 0.95047;
const YN: f64 = 1.00000;
const ZN: f64 = 1.08883;

const POW25_7: f64 = 6_103_515_625.0;

impl Lab {
    pub fn new(l: f64, a: f64, b: f64) -> Self {
        Self { l, a, b }
    }

    /// Convert an 8-bit sRGB sample
    pub fn from_rgb8(rgb: [u8; 3]) -> Self {
        Self::from_srgb(
            rgb[0] as f64 / 255.0,
            rgb[1] as f64 / 255.0,
            rgb[2] as f64 / 255.0,
        )
    }

    /// Convert a 16-bit sRGB sample
    pub fn from_rgb16(rgb: [u16; 3]) -> Self {
        Self::from_srgb(
            rgb[0] as f64 / 65535.0,
            rgb[1] as f64 / 65535.0,
            rgb[2] as f64 / 65535.0,
        )
    }

    /// Convert sRGB channels in `[0, 1]`
    #[allow(clippy::excessive_precision)]
    pub fn from_srgb(r: f64, g: f64, b: f64) -> Self {
        let r = srgb_to_linear(r);
        let g = srgb_to_linear(g);
        let b = srgb_to_linear(b);

        let x = r * 0.4124564 + g * 0.3575761 + b * 0.1804375;
        let y = r * 0.2126729 + g * 0.7151522 + b * 0.0721750;
        let z = r * 0.0193339 + g * 0.1191920 + b * 0.9503041;

        let fx = f_xyz(x / XN);
        let fy = f_xyz(y / YN);
        let fz = f_xyz(z / ZN);

        Self {
            l: 116.0 * fy - 16.0,
            a: 500.0 * (fx - fy),
            b: 200.0 * (fy - fz),
        }
    }
}

fn srgb_to_linear(c: f64) -> f64 {
    if c <= 0.04045 {
        c / 12.92
    } else {
        ((c + 0.055) / 1.055).powf(2.4)
    }
}

fn f_xyz(t: f64) -> f64 {
    const DELTA: f64 = 6.0 / 29.0;
    if t > DELTA * DELTA * DELTA {
        t.cbrt()
    } else {
        t / (3.0 * DELTA * DELTA) + 4.0 / 29.0
    }
}

/// CIEDE2000 ΔE₀₀ between two colors with unit weights (kL = kC = kH = 1)
pub fn ciede2000(lab1: &Lab, lab2: &Lab) -> f64 {
    let c1 = lab1.a.hypot(lab1.b);
    let c2 = lab2.a.hypot(lab2.b);
    let c_avg_7 = ((c1 + c2) / 2.0).powi(7);
    let g = 0.5 * (1.0 - (c_avg_7 / (c_avg_7 + POW25_7)).sqrt());

    let a1_prime = lab1.a * (1.0 + g);
    let a2_prime = lab2.a * (1.0 + g);
    let c1_prime = a1_prime.hypot(lab1.b);
    let c2_prime = a2_prime.hypot(lab2.b);
    let h1_prime = hue_degrees(a1_prime, lab1.b);
    let h2_prime = hue_degrees(a2_prime, lab2.b);

    let chroma_product = c1_prime * c2_prime;

    let delta_l_prime = lab2.l - lab1.l;
    let delta_c_prime = c2_prime - c1_prime;
    let delta_h_deg = if chroma_product == 0.0 {
        0.0
    } else {
        let dh = h2_prime - h1_prime;
        if dh > 180.0 {
            dh - 360.0
        } else if dh < -180.0 {
            dh + 360.0
        } else {
            dh
        }
    };
    let delta_h_prime = 2.0 * chroma_product.sqrt() * (delta_h_deg.to_radians() / 2.0).sin();

    let l_prime_avg = (lab1.l + lab2.l) / 2.0;
    let c_prime_avg = (c1_prime + c2_prime) / 2.0;
    let h_prime_avg = if chroma_product == 0.0 {
        h1_prime + h2_prime
    } else if (h1_prime - h2_prime).abs() <= 180.0 {
        (h1_prime + h2_prime) / 2.0
    } else if h1_prime + h2_prime < 360.0 {
        (h1_prime + h2_prime + 360.0) / 2.0
    } else {
        (h1_prime + h2_prime - 360.0) / 2.0
    };

    let t = 1.0 - 0.17 * (h_prime_avg - 30.0).to_radians().cos()
        + 0.24 * (2.0 * h_prime_avg).to_radians().cos()
        + 0.32 * (3.0 * h_prime_avg + 6.0).to_radians().cos()
        - 0.20 * (4.0 * h_prime_avg - 63.0).to_radians().cos();

    let delta_theta = 30.0 * (-((h_prime_avg - 275.0) / 25.0).powi(2)).exp();
    let c_prime_avg_7 = c_prime_avg.powi(7);
    let rc = 2.0 * (c_prime_avg_7 / (c_prime_avg_7 + POW25_7)).sqrt();

    let l_50_sq = (l_prime_avg - 50.0).powi(2);
    let sl = 1.0 + (0.015 * l_50_sq) / (20.0 + l_50_sq).sqrt();
    let sc = 1.0 + 0.045 * c_prime_avg;
    let sh = 1.0 + 0.015 * c_prime_avg * t;
    let rt = -(2.0 * delta_theta).to_radians().sin() * rc;

    let dl = delta_l_prime / sl;
    let dc = delta_c_prime / sc;
    let dh = delta_h_prime / sh;

    (dl * dl + dc * dc + dh * dh + rt * dc * dh).sqrt()
}

/// Hue angle in degrees, `[0, 360)`; 0 for achromatic colors
fn hue_degrees(a: f64, b: f64) -> f64 {
    if a == 0.0 && b == 0.0 {
        0.0
    } else {
        b.atan2(a).to_degrees().rem_euclid(360.0)
    }
}
