use std::io::{Read, Write};
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use flate2::read::GzDecoder;

use crate::config::DatasetFormat;
use crate::constants::{
    FRAME_COUNT, FRAME_LEN, GZIP_MAGIC, HDF5_FRAME_DATASET, HDF5_FRAME_GROUP_PREFIX,
};
use crate::error::DatasetError;
use crate::types::{frame_time, ForecastDataset, ForecastDatasetInfo, ForecastFrame};

pub trait FrameDecoder: Send + Sync {
    fn decode_frames(&self, payload: &[u8]) -> Result<Vec<Vec<u8>>>;
}

#[derive(Clone, Copy, Debug, Default)]
pub struct Hdf5FrameDecoder;

impl FrameDecoder for Hdf5FrameDecoder {
    fn decode_frames(&self, payload: &[u8]) -> Result<Vec<Vec<u8>>> {
        // libhdf5 only opens files by path.
        let mut spool = tempfile::Builder::new()
            .prefix("radar-nowcast-")
            .suffix(".h5")
            .tempfile()
            .context("Failed to create HDF5 spool file")?;
        spool
            .write_all(payload)
            .context("Failed to write HDF5 spool file")?;
        spool.flush().context("Failed to flush HDF5 spool file")?;

        let file = hdf5::File::open(spool.path()).context("Failed to open HDF5 dataset")?;

        (1..=FRAME_COUNT)
            .map(|index| {
                let group_name = format!("{HDF5_FRAME_GROUP_PREFIX}{index}");
                let dataset = file
                    .group(&group_name)
                    .and_then(|group| group.dataset(HDF5_FRAME_DATASET))
                    .with_context(|| format!("Missing {group_name}/{HDF5_FRAME_DATASET}"))?;

                let shape = dataset.shape();
                if shape.len() != 2 {
                    bail!("{group_name}/{HDF5_FRAME_DATASET} has shape {shape:?}, expected 2-D");
                }

                dataset
                    .read_raw::<u8>()
                    .with_context(|| format!("Failed to read {group_name}/{HDF5_FRAME_DATASET}"))
            })
            .collect()
    }
}

#[derive(Clone, Copy, Debug, Default)]
pub struct PackedFrameDecoder;

impl FrameDecoder for PackedFrameDecoder {
    fn decode_frames(&self, payload: &[u8]) -> Result<Vec<Vec<u8>>> {
        let raw = if payload.starts_with(&GZIP_MAGIC) {
            let mut inflated = Vec::with_capacity(FRAME_COUNT * FRAME_LEN);
            GzDecoder::new(payload)
                .read_to_end(&mut inflated)
                .context("Failed to gunzip packed frames")?;
            inflated
        } else {
            payload.to_vec()
        };

        if raw.len() != FRAME_COUNT * FRAME_LEN {
            bail!(
                "Packed payload holds {} bytes, expected {} frames of {} bytes",
                raw.len(),
                FRAME_COUNT,
                FRAME_LEN
            );
        }

        Ok(raw.chunks_exact(FRAME_LEN).map(<[u8]>::to_vec).collect())
    }
}

pub fn decoder_for(format: DatasetFormat) -> Arc<dyn FrameDecoder> {
    match format {
        DatasetFormat::Hdf5 => Arc::new(Hdf5FrameDecoder),
        DatasetFormat::Packed => Arc::new(PackedFrameDecoder),
    }
}

pub fn build_dataset(
    info: ForecastDatasetInfo,
    frames: Vec<Vec<u8>>,
) -> Result<ForecastDataset, DatasetError> {
    let frames = frames
        .into_iter()
        .enumerate()
        .map(|(index, values)| ForecastFrame {
            time: frame_time(info.reference_time, index),
            values,
        })
        .collect();

    ForecastDataset::new(info, frames)
}

#[cfg(test)]
mod tests {
    use flate2::write::GzEncoder;
    use flate2::Compression;

    use super::*;
    use crate::types::testdata::{info, patterned_frames};

    const FIXTURE_ROWS: usize = 3;
    const FIXTURE_COLS: usize = 4;

    fn packed_payload() -> Vec<u8> {
        patterned_frames()
            .into_iter()
            .flat_map(|frame| frame.values)
            .collect()
    }

    fn fixture_frame(frame: usize) -> Vec<u8> {
        (0..FIXTURE_ROWS * FIXTURE_COLS)
            .map(|offset| (frame * 10 + offset) as u8)
            .collect()
    }

    fn hdf5_payload(frame_count: usize) -> Vec<u8> {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("fixture.h5");
        {
            let file = hdf5::File::create(&path).unwrap();
            for frame in 0..frame_count {
                let group = file.create_group(&format!("image{}", frame + 1)).unwrap();
                let dataset = group
                    .new_dataset::<u8>()
                    .shape([FIXTURE_ROWS, FIXTURE_COLS])
                    .create("image_data")
                    .unwrap();
                dataset.write_raw(&fixture_frame(frame)).unwrap();
            }
        }
        std::fs::read(&path).unwrap()
    }

    #[test]
    fn hdf5_decoder_reads_image_groups_in_order() {
        let frames = Hdf5FrameDecoder.decode_frames(&hdf5_payload(FRAME_COUNT)).unwrap();

        assert_eq!(frames.len(), FRAME_COUNT);
        assert_eq!(frames[0], fixture_frame(0));
        assert_eq!(frames[24], fixture_frame(24));
        // Row-major: second row starts at offset FIXTURE_COLS.
        assert_eq!(frames[1][FIXTURE_COLS], 10 + FIXTURE_COLS as u8);
    }

    #[test]
    fn hdf5_decoder_reports_missing_frame_group() {
        let error = Hdf5FrameDecoder
            .decode_frames(&hdf5_payload(FRAME_COUNT - 1))
            .unwrap_err();
        assert!(format!("{error:#}").contains("image25"), "{error:#}");
    }

    #[test]
    fn hdf5_decoder_rejects_non_hdf5_payload() {
        assert!(Hdf5FrameDecoder.decode_frames(b"not an hdf5 file").is_err());
    }

    #[test]
    fn undersized_hdf5_frames_are_refused_by_dataset_validation() {
        let frames = Hdf5FrameDecoder.decode_frames(&hdf5_payload(FRAME_COUNT)).unwrap();
        assert!(matches!(
            build_dataset(info("a.h5"), frames),
            Err(DatasetError::FrameLength { frame: 0, .. })
        ));
    }

    #[test]
    fn splits_packed_payload_into_frames() {
        let frames = PackedFrameDecoder.decode_frames(&packed_payload()).unwrap();
        let expected: Vec<Vec<u8>> = patterned_frames().into_iter().map(|f| f.values).collect();
        assert_eq!(frames, expected);
    }

    #[test]
    fn inflates_gzip_payload() {
        let mut encoder = GzEncoder::new(Vec::new(), Compression::fast());
        encoder.write_all(&packed_payload()).unwrap();
        let zipped = encoder.finish().unwrap();

        let frames = PackedFrameDecoder.decode_frames(&zipped).unwrap();
        assert_eq!(frames.len(), FRAME_COUNT);
        assert_eq!(frames[7], patterned_frames()[7].values);
    }

    #[test]
    fn rejects_truncated_payload() {
        let mut payload = packed_payload();
        payload.truncate(payload.len() - 1);
        assert!(PackedFrameDecoder.decode_frames(&payload).is_err());
    }

    #[test]
    fn decoder_for_packed_format_splits_packed_payloads() {
        let frames = decoder_for(DatasetFormat::Packed)
            .decode_frames(&packed_payload())
            .unwrap();
        assert_eq!(frames.len(), FRAME_COUNT);
    }

    #[test]
    fn decoder_for_hdf5_format_reads_hdf5_payloads() {
        let frames = decoder_for(DatasetFormat::Hdf5)
            .decode_frames(&hdf5_payload(FRAME_COUNT))
            .unwrap();
        assert_eq!(frames[3], fixture_frame(3));
        assert!(decoder_for(DatasetFormat::Hdf5)
            .decode_frames(&packed_payload())
            .is_err());
    }

    #[test]
    fn build_dataset_stamps_frame_times() {
        let frames = PackedFrameDecoder.decode_frames(&packed_payload()).unwrap();
        let dataset = build_dataset(info("a.h5"), frames).unwrap();
        assert_eq!(
            dataset.frames()[4].time,
            frame_time(dataset.info().reference_time, 4)
        );
    }

    #[test]
    fn build_dataset_refuses_missing_frames() {
        let mut frames = PackedFrameDecoder.decode_frames(&packed_payload()).unwrap();
        frames.truncate(24);
        assert_eq!(
            build_dataset(info("a.h5"), frames).unwrap_err(),
            DatasetError::FrameCount {
                expected: FRAME_COUNT,
                actual: 24
            }
        );
    }
}
