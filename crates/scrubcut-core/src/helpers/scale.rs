// crates/scrubcut-core/src/helpers/scale.rs
//
// Size fitting and RGBA downsampling.
//
// Decoders hand back frames at native resolution; thumbnail tasks shrink them
// here so the decode lock is never held for the resize.

use crate::media_types::Frame;

/// Output size for a frame of `src_w`×`src_h` fitted to `max_w` pixels wide,
/// preserving aspect. Never upscales and never returns a zero dimension.
///
/// ```
/// use scrubcut_core::helpers::scale::fit_width;
/// assert_eq!(fit_width(1920, 1080, 64), (64, 36));
/// assert_eq!(fit_width(32, 18, 64), (32, 18));
/// ```
pub fn fit_width(src_w: u32, src_h: u32, max_w: u32) -> (u32, u32) {
    if max_w == 0 || src_w <= max_w {
        return (src_w.max(1), src_h.max(1));
    }
    let h = (src_h as u64 * max_w as u64 / src_w.max(1) as u64).max(1) as u32;
    (max_w, h)
}

/// Box-filter `frame` down to at most `max_w` pixels wide.
pub fn downsample_to_width(frame: &Frame, max_w: u32) -> Frame {
    let (out_w, out_h) = fit_width(frame.width, frame.height, max_w);
    if out_w == frame.width && out_h == frame.height {
        return frame.clone();
    }

    let (src_w, src_h) = (frame.width as usize, frame.height as usize);
    let (dw, dh)       = (out_w as usize, out_h as usize);
    let mut data       = vec![0u8; dw * dh * 4];

    for oy in 0..dh {
        let y0 = oy * src_h / dh;
        let y1 = ((oy + 1) * src_h / dh).max(y0 + 1).min(src_h);
        for ox in 0..dw {
            let x0 = ox * src_w / dw;
            let x1 = ((ox + 1) * src_w / dw).max(x0 + 1).min(src_w);

            let mut acc = [0u32; 4];
            let mut n   = 0u32;
            for y in y0..y1 {
                let row = y * src_w * 4;
                for x in x0..x1 {
                    let i = row + x * 4;
                    for (c, a) in acc.iter_mut().enumerate() {
                        *a += frame.data[i + c] as u32;
                    }
                    n += 1;
                }
            }
            let o = (oy * dw + ox) * 4;
            for (c, a) in acc.iter().enumerate() {
                data[o + c] = (a / n.max(1)) as u8;
            }
        }
    }

    Frame { timestamp: frame.timestamp, width: out_w, height: out_h, data }
}
