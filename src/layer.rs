use crate::error::{FrameupError, FrameupResult};

/// A premultiplied RGBA8 raster. Every layer the pipeline touches
/// (background, warped artwork, shadow, composite) is one of these.
#[derive(Clone, Debug, PartialEq)]
pub struct LayerRgba {
    pub width: u32,
    pub height: u32,
    pub data: Vec<u8>,
}

impl LayerRgba {
    pub fn new_transparent(width: u32, height: u32) -> FrameupResult<Self> {
        let len = buffer_len(width, height)?;
        Ok(Self {
            width,
            height,
            data: vec![0u8; len],
        })
    }

    pub fn solid(width: u32, height: u32, rgba: [u8; 4]) -> FrameupResult<Self> {
        let mut layer = Self::new_transparent(width, height)?;
        let premul = premultiply_px(rgba);
        for px in layer.data.chunks_exact_mut(4) {
            px.copy_from_slice(&premul);
        }
        Ok(layer)
    }

    /// Wraps a straight-alpha RGBA8 buffer, premultiplying in the process.
    pub fn from_straight_rgba8(width: u32, height: u32, mut data: Vec<u8>) -> FrameupResult<Self> {
        let len = buffer_len(width, height)?;
        if data.len() != len {
            return Err(FrameupError::validation(
                "rgba8 buffer length must be width*height*4",
            ));
        }
        premultiply_rgba8_in_place(&mut data);
        Ok(Self {
            width,
            height,
            data,
        })
    }

    #[inline]
    pub fn pixel(&self, x: u32, y: u32) -> [u8; 4] {
        let i = ((y * self.width + x) as usize) * 4;
        [
            self.data[i],
            self.data[i + 1],
            self.data[i + 2],
            self.data[i + 3],
        ]
    }

    #[inline]
    pub fn put_pixel(&mut self, x: u32, y: u32, px: [u8; 4]) {
        let i = ((y * self.width + x) as usize) * 4;
        self.data[i..i + 4].copy_from_slice(&px);
    }

    /// Alpha channel only, one byte per pixel. The artwork silhouette for
    /// shadow synthesis.
    pub fn alpha_mask(&self) -> Vec<u8> {
        self.data.chunks_exact(4).map(|px| px[3]).collect()
    }

    /// Converts back to straight alpha for encoding/resampling.
    pub fn to_straight_rgba8(&self) -> Vec<u8> {
        let mut out = self.data.clone();
        for px in out.chunks_exact_mut(4) {
            let a = px[3] as u16;
            if a == 0 || a == 255 {
                continue;
            }
            for c in px.iter_mut().take(3) {
                *c = ((u16::from(*c) * 255 + a / 2) / a).min(255) as u8;
            }
        }
        out
    }
}

fn buffer_len(width: u32, height: u32) -> FrameupResult<usize> {
    if width == 0 || height == 0 {
        return Err(FrameupError::validation("layer width/height must be > 0"));
    }
    (width as usize)
        .checked_mul(height as usize)
        .and_then(|v| v.checked_mul(4))
        .ok_or_else(|| FrameupError::validation("layer buffer size overflow"))
}

pub fn premultiply_rgba8_in_place(rgba: &mut [u8]) {
    for px in rgba.chunks_exact_mut(4) {
        let a = px[3] as u16;
        if a == 255 {
            continue;
        }
        if a == 0 {
            px[0] = 0;
            px[1] = 0;
            px[2] = 0;
            continue;
        }
        px[0] = ((px[0] as u16 * a + 127) / 255) as u8;
        px[1] = ((px[1] as u16 * a + 127) / 255) as u8;
        px[2] = ((px[2] as u16 * a + 127) / 255) as u8;
    }
}

fn premultiply_px(rgba: [u8; 4]) -> [u8; 4] {
    let mut px = rgba;
    premultiply_rgba8_in_place(&mut px);
    px
}
