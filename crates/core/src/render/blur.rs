use tiny_skia::Pixmap;

const PASSES: usize = 3;

/// Box radius that, applied [`PASSES`] times, approximates a gaussian with
/// the given standard deviation.
pub fn box_radius_for_sigma(sigma: f32) -> usize {
    if !sigma.is_finite() || sigma <= 0.0 {
        return 0;
    }
    let ideal = (12.0 * sigma * sigma / PASSES as f32 + 1.0).sqrt();
    ((ideal - 1.0) / 2.0).round().max(0.0) as usize
}

/// Approximate gaussian blur over premultiplied RGBA, in place. Pixels
/// outside the surface count as transparent.
pub fn gaussian_blur(pixmap: &mut Pixmap, sigma: f32) {
    let radius = box_radius_for_sigma(sigma);
    if radius == 0 {
        return;
    }

    let width = pixmap.width() as usize;
    let height = pixmap.height() as usize;
    let mut scratch = vec![0u8; width * height * 4];

    for _ in 0..PASSES {
        box_pass(pixmap.data(), &mut scratch, width, height, radius, Axis::Horizontal);
        box_pass(&scratch, pixmap.data_mut(), width, height, radius, Axis::Vertical);
    }
}

#[derive(Clone, Copy)]
enum Axis {
    Horizontal,
    Vertical,
}

/// One running-sum box pass from `src` into `dst`.
fn box_pass(src: &[u8], dst: &mut [u8], width: usize, height: usize, radius: usize, axis: Axis) {
    let (lines, len, stride, line_step) = match axis {
        Axis::Horizontal => (height, width, 4, width * 4),
        Axis::Vertical => (width, height, width * 4, 4),
    };
    let window = (2 * radius + 1) as u32;

    for line in 0..lines {
        let base = line * line_step;
        let mut sum = [0u32; 4];

        for i in 0..radius.min(len) {
            let offset = base + i * stride;
            for c in 0..4 {
                sum[c] += src[offset + c] as u32;
            }
        }

        for i in 0..len {
            let incoming = i + radius;
            if incoming < len {
                let offset = base + incoming * stride;
                for c in 0..4 {
                    sum[c] += src[offset + c] as u32;
                }
            }

            let offset = base + i * stride;
            for c in 0..4 {
                dst[offset + c] = ((sum[c] + window / 2) / window) as u8;
            }

            if i >= radius {
                let outgoing = base + (i - radius) * stride;
                for c in 0..4 {
                    sum[c] -= src[outgoing + c] as u32;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tiny_skia::{Color, PremultipliedColorU8};

    #[test]
    fn radius_grows_with_sigma() {
        assert_eq!(box_radius_for_sigma(0.0), 0);
        assert_eq!(box_radius_for_sigma(f32::NAN), 0);
        assert!(box_radius_for_sigma(45.0) > box_radius_for_sigma(5.0));
        assert_eq!(box_radius_for_sigma(45.0), 45);
    }

    #[test]
    fn uniform_interior_is_preserved() {
        let mut pixmap = Pixmap::new(64, 64).unwrap();
        pixmap.fill(Color::from_rgba8(200, 100, 50, 255));
        gaussian_blur(&mut pixmap, 2.0);

        let centre = pixmap.pixel(32, 32).unwrap();
        assert_eq!(
            centre,
            PremultipliedColorU8::from_rgba(200, 100, 50, 255).unwrap()
        );
        // Edges bleed into the transparent outside.
        assert!(pixmap.pixel(0, 0).unwrap().alpha() < 255);
    }

    #[test]
    fn single_pixel_spreads_out() {
        let mut pixmap = Pixmap::new(33, 33).unwrap();
        let idx = (16 * 33 + 16) * 4;
        pixmap.data_mut()[idx..idx + 4].copy_from_slice(&[255, 255, 255, 255]);
        gaussian_blur(&mut pixmap, 3.0);

        let centre = pixmap.pixel(16, 16).unwrap().alpha();
        let near = pixmap.pixel(18, 16).unwrap().alpha();
        assert!(centre < 255);
        assert!(near > 0);
        assert!(centre >= near);
    }
}
