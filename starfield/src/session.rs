//! Entry points for a front end: crop, analyze and visualize.
//!
//! A [`Session`] remembers the paths the user picked and the detections of the
//! last successful analysis, and checks that each request has what it needs.

use std::path::{Path, PathBuf};
use std::time::Instant;

use crate::analysis::{ProgressCallback, TileAnalyzer, TileFailure};
use crate::config::Config;
use crate::detection::Detection;
use crate::detector::{ObjectDetector, PeakDetector};
use crate::error::{Error, Result};
use crate::reconcile::reconcile;
use crate::{overlay, report, tiler};

/// What one [`Session::request_analyze`] call produced.
#[derive(Debug, Clone)]
pub struct AnalyzeSummary {
    pub tile_count: usize,
    /// Detections before boundary reconciliation.
    pub raw_detections: usize,
    /// Detections after reconciliation, as written to the report.
    pub detections: usize,
    pub failures: Vec<TileFailure>,
    pub report_path: PathBuf,
}

pub struct Session<D = PeakDetector> {
    config: Config,
    analyzer: TileAnalyzer<D>,
    source_path: Option<PathBuf>,
    tile_dir: Option<PathBuf>,
    detections: Option<Vec<Detection>>,
}

impl Session<PeakDetector> {
    /// Session using the built-in detector configured from `config.detector`.
    pub fn new(config: Config) -> Self {
        let detector = PeakDetector::from_config(config.detector);
        Self::with_detector(config, detector)
    }
}

impl<D: ObjectDetector> Session<D> {
    pub fn with_detector(config: Config, detector: D) -> Self {
        let analyzer = TileAnalyzer::new(detector).with_max_workers(config.max_workers);
        Self {
            config,
            analyzer,
            source_path: None,
            tile_dir: None,
            detections: None,
        }
    }

    pub fn with_progress(self, callback: ProgressCallback) -> Self {
        Self {
            analyzer: self.analyzer.with_progress(callback),
            ..self
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn source_path(&self) -> Option<&Path> {
        self.source_path.as_deref()
    }

    pub fn tile_dir(&self) -> Option<&Path> {
        self.tile_dir.as_deref()
    }

    /// Detections of the last successful analysis.
    pub fn detections(&self) -> Option<&[Detection]> {
        self.detections.as_deref()
    }

    /// Replaces the current detections, e.g. with ones read back from a report.
    pub fn set_detections(&mut self, detections: Vec<Detection>) {
        self.detections = Some(detections);
    }

    /// Crops the source image into tiles under `output_dir`.
    ///
    /// On success both paths are remembered for later requests.
    pub fn request_crop(
        &mut self,
        source_path: Option<&Path>,
        output_dir: Option<&Path>,
    ) -> Result<()> {
        let source_path = source_path.ok_or_else(|| Error::invalid_input("select source image"))?;
        let output_dir = output_dir.ok_or_else(|| Error::invalid_input("select output directory"))?;

        tiler::crop_file(
            source_path,
            output_dir,
            self.config.tile_size,
            &self.config.tile_extension,
        )?;

        self.source_path = Some(source_path.to_path_buf());
        self.tile_dir = Some(output_dir.to_path_buf());
        Ok(())
    }

    /// Analyzes the tiles in `tile_dir`, or in the last cropped directory,
    /// reconciles boundary duplicates and writes the report.
    ///
    /// The current detections are replaced only when every step succeeds.
    pub fn request_analyze(&mut self, tile_dir: Option<&Path>) -> Result<AnalyzeSummary> {
        let tile_dir = tile_dir
            .map(Path::to_path_buf)
            .or_else(|| self.tile_dir.clone())
            .ok_or_else(|| Error::invalid_input("select cropped images directory"))?;

        let start = Instant::now();
        let result = self
            .analyzer
            .analyze(&tile_dir, self.config.detection_radius)?;
        let merged = reconcile(
            &result.detections,
            self.config.boundary_tolerance,
            self.config.merge_policy,
        )?;
        report::write(&self.config.report_path, &merged)?;

        tracing::info!(
            tile_dir = %tile_dir.display(),
            tiles = result.tile_count,
            raw = result.detections.len(),
            merged = merged.len(),
            failures = result.failures.len(),
            elapsed_ms = start.elapsed().as_millis() as u64,
            "Analysis request complete"
        );

        let summary = AnalyzeSummary {
            tile_count: result.tile_count,
            raw_detections: result.detections.len(),
            detections: merged.len(),
            failures: result.failures,
            report_path: self.config.report_path.clone(),
        };
        self.tile_dir = Some(tile_dir);
        self.detections = Some(merged);
        Ok(summary)
    }

    /// Draws the current detections over `source_path`, or over the last
    /// cropped source, and writes the overlay. Returns the overlay path.
    pub fn request_visualize(&self, source_path: Option<&Path>) -> Result<PathBuf> {
        let source_path = source_path
            .or(self.source_path.as_deref())
            .ok_or_else(|| Error::invalid_input("select source image"))?;
        let detections = self
            .detections
            .as_deref()
            .ok_or_else(|| Error::invalid_input("analyze data first"))?;

        overlay::render_file(
            source_path,
            detections,
            self.config.marker_size,
            &self.config.overlay_path,
        )?;
        Ok(self.config.overlay_path.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{DynamicImage, GenericImageView};
    use tempfile::TempDir;

    use crate::detection::LocalDetection;
    use crate::detector::DetectError;
    use crate::image_io::{load_image, save_image};
    use crate::testing::{default_star_field, init_tracing};

    const STARS: [(f64, f64); 4] = [(30.0, 30.0), (160.0, 40.0), (30.0, 170.0), (99.5, 150.0)];

    fn config_in(dir: &Path) -> Config {
        Config {
            report_path: dir.join("statistic.txt"),
            overlay_path: dir.join("result.png"),
            max_workers: 2,
            ..Config::default()
        }
    }

    fn write_source(dir: &Path) -> PathBuf {
        let path = dir.join("source.png");
        save_image(&path, &default_star_field(200, 200, &STARS)).unwrap();
        path
    }

    fn reason(err: Error) -> String {
        match err {
            Error::InvalidInput { reason } => reason,
            other => panic!("expected invalid input, got {other}"),
        }
    }

    #[test]
    fn test_full_session_flow() {
        init_tracing();
        let dir = TempDir::new().unwrap();
        let source = write_source(dir.path());
        let tiles = dir.path().join("tiles");
        let mut session = Session::new(config_in(dir.path()));

        session.request_crop(Some(&source), Some(&tiles)).unwrap();
        assert_eq!(session.tile_dir(), Some(tiles.as_path()));

        let summary = session.request_analyze(None).unwrap();
        assert_eq!(summary.tile_count, 4);
        assert!(summary.failures.is_empty());
        // The star on the x = 100 tile edge is seen by two tiles.
        assert_eq!(summary.raw_detections, 5);
        assert_eq!(summary.detections, 4);

        let detections = session.detections().unwrap();
        for &(x, y) in &STARS {
            assert!(
                detections
                    .iter()
                    .any(|d| (d.x() - x).abs() < 0.75 && (d.y() - y).abs() < 0.75),
                "star ({x}, {y}) not found in {detections:?}"
            );
        }
        assert_eq!(report::read(&summary.report_path).unwrap(), detections);

        let overlay_path = session.request_visualize(None).unwrap();
        let overlay = load_image(&overlay_path).unwrap();
        assert_eq!(overlay.dimensions(), (200, 200));
    }

    #[test]
    fn test_crop_requires_paths() {
        let dir = TempDir::new().unwrap();
        let source = write_source(dir.path());
        let mut session = Session::new(config_in(dir.path()));

        let err = session.request_crop(None, Some(dir.path())).unwrap_err();
        assert_eq!(reason(err), "select source image");
        let err = session.request_crop(Some(&source), None).unwrap_err();
        assert_eq!(reason(err), "select output directory");
        assert!(session.source_path().is_none());
    }

    #[test]
    fn test_analyze_requires_tile_dir() {
        let dir = TempDir::new().unwrap();
        let mut session = Session::new(config_in(dir.path()));
        let err = session.request_analyze(None).unwrap_err();
        assert_eq!(reason(err), "select cropped images directory");
    }

    #[test]
    fn test_visualize_requires_detections() {
        let dir = TempDir::new().unwrap();
        let source = write_source(dir.path());
        let session = Session::new(config_in(dir.path()));
        let err = session.request_visualize(Some(&source)).unwrap_err();
        assert_eq!(reason(err), "analyze data first");
    }

    #[test]
    fn test_visualize_requires_source() {
        let dir = TempDir::new().unwrap();
        let mut session = Session::new(config_in(dir.path()));
        session.set_detections(vec![Detection::new(1.0, 1.0, 1.0, 1.0)]);
        let err = session.request_visualize(None).unwrap_err();
        assert_eq!(reason(err), "select source image");
    }

    #[test]
    fn test_failed_analysis_keeps_previous_detections() {
        let dir = TempDir::new().unwrap();
        let tiles = dir.path().join("tiles");
        std::fs::create_dir(&tiles).unwrap();
        save_image(&tiles.join("img0x0.png"), &default_star_field(10, 10, &[])).unwrap();

        let detector = |_: &DynamicImage, _: f32| {
            Ok::<_, DetectError>(vec![LocalDetection::new(2.0, 3.0, 1.0, 1.0)])
        };
        let mut session = Session::with_detector(config_in(dir.path()), detector);
        session.request_analyze(Some(&tiles)).unwrap();
        let before = session.detections().unwrap().to_vec();
        assert_eq!(before, vec![Detection::new(2.0, 3.0, 1.0, 1.0)]);

        let err = session
            .request_analyze(Some(&dir.path().join("missing")))
            .unwrap_err();
        assert!(err.is_invalid_input());
        assert_eq!(session.detections().unwrap(), before.as_slice());
        assert_eq!(session.tile_dir(), Some(tiles.as_path()));
    }

    #[test]
    fn test_unwritable_report_keeps_previous_detections() {
        let dir = TempDir::new().unwrap();
        let tiles = dir.path().join("tiles");
        std::fs::create_dir(&tiles).unwrap();
        save_image(&tiles.join("img0x0.png"), &default_star_field(10, 10, &[])).unwrap();

        let config = Config {
            report_path: dir.path().join("no-such-dir").join("statistic.txt"),
            ..config_in(dir.path())
        };
        let detector = |_: &DynamicImage, _: f32| {
            Ok::<_, DetectError>(vec![LocalDetection::new(1.0, 1.0, 1.0, 1.0)])
        };
        let mut session = Session::with_detector(config, detector);

        assert!(session.request_analyze(Some(&tiles)).unwrap_err().is_io());
        assert!(session.detections().is_none());
    }
}
