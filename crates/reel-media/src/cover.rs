//! Cover frame extraction.

use std::path::Path;

use reel_models::encoding::COVER_OFFSET_SECS;

use crate::command::{FfmpegCommand, FfmpegRunner};
use crate::error::{MediaError, MediaResult};
use crate::filters::aspect_chain;
use crate::render::RenderGeometry;

/// Where to grab the cover: one second in, or the midpoint of clips shorter
/// than two seconds.
pub fn cover_offset(duration: f64) -> f64 {
    if duration >= 2.0 * COVER_OFFSET_SECS {
        COVER_OFFSET_SECS
    } else {
        (duration / 2.0).max(0.0)
    }
}

/// Write a JPEG cover taken from `video` through the reel's aspect chain.
pub async fn extract_cover(
    runner: &FfmpegRunner,
    video: &Path,
    output: &Path,
    duration: f64,
    geometry: &RenderGeometry,
) -> MediaResult<()> {
    let filter = aspect_chain(
        geometry.width,
        geometry.height,
        geometry.fps,
        Some((geometry.width, geometry.height)),
    );

    let cmd = FfmpegCommand::new(video, output)
        .seek(cover_offset(duration))
        .video_filter(filter.to_string())
        .single_frame()
        .output_arg("-q:v")
        .output_arg("2")
        .output_arg("-an");

    runner.run(&cmd).await?;

    if !tokio::fs::try_exists(output).await.unwrap_or(false) {
        return Err(MediaError::InvalidVideo(format!(
            "no cover frame written for {}",
            video.display()
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cover_offset() {
        assert_eq!(cover_offset(15.0), 1.0);
        assert_eq!(cover_offset(2.0), 1.0);
        assert_eq!(cover_offset(1.5), 0.75);
        assert_eq!(cover_offset(0.0), 0.0);
    }
}
