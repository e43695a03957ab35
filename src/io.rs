// io.rs — Grayscale image files via the `image` crate.
//
// Any format `image` can decode is accepted; colour inputs are converted to
// 8-bit luma on load. The output format follows the file extension.

use std::path::Path;

use crate::error::{InputError, StencilError};
use crate::image::Image;

/// Decode `path` as an 8-bit single-channel image.
pub fn load_grayscale(path: impl AsRef<Path>) -> Result<Image<u8>, InputError> {
    let path = path.as_ref();
    let img = image::open(path)
        .map_err(|source| InputError::Open { path: path.to_path_buf(), source })?
        .to_luma8();
    let (w, h) = img.dimensions();
    Ok(Image::from_vec(w as usize, h as usize, img.into_raw()))
}

/// Encode `img` to `path`; the format is chosen from the extension.
pub fn save_grayscale(path: impl AsRef<Path>, img: &Image<u8>) -> Result<(), StencilError> {
    let path = path.as_ref();
    if path.as_os_str().is_empty() {
        return Err(InputError::EmptyOutputPath.into());
    }
    let out_err = |source| StencilError::Output { path: path.to_path_buf(), source };

    let buf = image::GrayImage::from_raw(
        img.width() as u32,
        img.height() as u32,
        img.to_packed().into_owned(),
    )
    .ok_or_else(|| {
        out_err(image::ImageError::Parameter(image::error::ParameterError::from_kind(
            image::error::ParameterErrorKind::DimensionMismatch,
        )))
    })?;
    buf.save(path).map_err(out_err)
}
