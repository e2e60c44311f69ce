//! Indexing and identification entry points
//!
//! [`Fingerprinter`] runs audio through spectrogram, peak picking, landmark
//! pairing and hashing. [`Recognizer`] ties it to a storage backend and the
//! matcher.

use std::borrow::Cow;
use std::path::Path;
use std::sync::Arc;

use crate::audio::{load_waveform, Waveform};
use crate::config::{MatchingConfig, SongmarkConfig};
use crate::error::{Error, Result};
use crate::hashing::{FingerprintRecord, LandmarkHasher};
use crate::landmark::{Landmark, LandmarkGenerator};
use crate::matching::{MatchResult, Matcher};
use crate::peaks::PeakPicker;
use crate::spectrogram::SpectrogramBuilder;
use crate::storage_backend::{FingerprintIndex, SongMetadata, StorageBackend};
use crate::storage_config::SongmarkSettings;

/// Where the audio of a request comes from
#[derive(Debug, Clone, Copy)]
pub enum AudioSource<'a> {
    /// WAV file on disk
    Path(&'a Path),
    /// Already decoded mono samples
    Waveform(&'a Waveform),
}

impl<'a> From<&'a Path> for AudioSource<'a> {
    fn from(path: &'a Path) -> Self {
        AudioSource::Path(path)
    }
}

impl<'a> From<&'a Waveform> for AudioSource<'a> {
    fn from(waveform: &'a Waveform) -> Self {
        AudioSource::Waveform(waveform)
    }
}

/// Audio to landmarks and hash records
#[derive(Debug, Clone)]
pub struct Fingerprinter {
    sample_rate: u32,
    spectrogram: SpectrogramBuilder,
    peak_picker: PeakPicker,
    landmarks: LandmarkGenerator,
    hasher: LandmarkHasher,
}

impl Fingerprinter {
    pub fn new(config: &SongmarkConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            sample_rate: config.sample_rate,
            spectrogram: SpectrogramBuilder::from_config(config),
            peak_picker: PeakPicker::from_config(config),
            landmarks: LandmarkGenerator::from_config(config),
            hasher: LandmarkHasher::from_config(config),
        })
    }

    /// Analysis sample rate
    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn hasher(&self) -> &LandmarkHasher {
        &self.hasher
    }

    /// Decode or resample the source to the analysis rate
    pub fn load<'a>(&self, source: AudioSource<'a>) -> Result<Cow<'a, Waveform>> {
        match source {
            AudioSource::Path(path) => Ok(Cow::Owned(load_waveform(path, self.sample_rate)?)),
            AudioSource::Waveform(waveform) if waveform.sample_rate == self.sample_rate => {
                Ok(Cow::Borrowed(waveform))
            }
            AudioSource::Waveform(waveform) => {
                log::debug!(
                    "Resampling query from {}Hz to {}Hz",
                    waveform.sample_rate,
                    self.sample_rate
                );
                Ok(Cow::Owned(waveform.clone().into_rate(self.sample_rate)?))
            }
        }
    }

    /// Landmarks of mono samples
    pub fn landmarks_from_samples(
        &self,
        samples: &[f32],
        sample_rate: u32,
    ) -> Result<Vec<Landmark>> {
        let spectrogram = self.spectrogram.build(samples, sample_rate)?;
        let peaks = self.peak_picker.pick(&spectrogram);
        let landmarks = self.landmarks.generate(&peaks);

        log::debug!(
            "{} frames -> {} peaks -> {} landmarks",
            spectrogram.num_frames(),
            peaks.len(),
            landmarks.len()
        );

        Ok(landmarks)
    }

    pub fn landmarks(&self, source: AudioSource<'_>) -> Result<Vec<Landmark>> {
        let waveform = self.load(source)?;
        self.landmarks_from_samples(&waveform.samples, waveform.sample_rate)
    }

    /// Hash records for indexing `song_id`
    pub fn records(
        &self,
        source: AudioSource<'_>,
        song_id: &str,
    ) -> Result<Vec<FingerprintRecord>> {
        let landmarks = self.landmarks(source)?;
        Ok(self.hasher.records(song_id, &landmarks))
    }
}

/// Song indexing and identification against one index
pub struct Recognizer<I: ?Sized = dyn StorageBackend> {
    index: Arc<I>,
    fingerprinter: Fingerprinter,
    matcher: Matcher,
}

impl<I: FingerprintIndex + ?Sized> Recognizer<I> {
    pub fn new(index: Arc<I>, config: &SongmarkConfig, matching: MatchingConfig) -> Result<Self> {
        matching.validate()?;
        let fingerprinter = Fingerprinter::new(config)?;
        let matcher = Matcher::new(matching, fingerprinter.hasher().clone());
        Ok(Self {
            index,
            fingerprinter,
            matcher,
        })
    }

    pub fn from_settings(index: Arc<I>, settings: &SongmarkSettings) -> Result<Self> {
        Self::new(index, &settings.fingerprint, settings.matching.clone())
    }

    pub fn index(&self) -> &Arc<I> {
        &self.index
    }

    pub fn fingerprinter(&self) -> &Fingerprinter {
        &self.fingerprinter
    }

    pub fn matcher(&self) -> &Matcher {
        &self.matcher
    }

    /// Fingerprint a song and store its records, returning how many were written
    pub async fn index_song(&self, source: AudioSource<'_>, song_id: &str) -> Result<usize> {
        if self.index.contains_song(song_id).await? {
            return Err(Error::DuplicateSong(song_id.to_string()));
        }

        let records = self.fingerprinter.records(source, song_id)?;
        self.store(song_id, &records).await
    }

    /// Store records computed elsewhere (e.g. by a parallel batch)
    pub async fn store(&self, song_id: &str, records: &[FingerprintRecord]) -> Result<usize> {
        if records.is_empty() {
            log::warn!("No landmarks found for {}, nothing indexed", song_id);
            return Ok(0);
        }
        self.index.write_batch(song_id, records).await?;
        log::info!("Indexed {} with {} records", song_id, records.len());
        Ok(records.len())
    }

    /// Identify the song a recording came from
    pub async fn identify_song(&self, source: AudioSource<'_>) -> Result<MatchResult> {
        let landmarks = self.fingerprinter.landmarks(source)?;
        let result = self.matcher.query(self.index.as_ref(), &landmarks).await?;

        log::info!(
            "Query result: {:?} ({} votes, song {:?})",
            result.status,
            result.votes,
            result.song_id
        );

        Ok(result)
    }
}

impl<I: StorageBackend + ?Sized> Recognizer<I> {
    /// Index a song and store its catalog metadata
    pub async fn index_song_with_metadata(
        &self,
        source: AudioSource<'_>,
        metadata: &SongMetadata,
    ) -> Result<usize> {
        let written = self.index_song(source, &metadata.song_id).await?;
        self.index.put_song(metadata).await?;
        Ok(written)
    }

    /// Stored metadata of a song
    pub async fn song_metadata(&self, song_id: &str) -> Result<Option<SongMetadata>> {
        self.index.get_song(song_id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::matching::MatchStatus;
    use crate::peaks::Peak;
    use crate::storage_backend::MemoryBackend;

    const RATE: u32 = 22050;

    /// A melody of quarter-second tones with pseudo-random pitches
    fn melody(seed: u64, seconds: usize) -> Waveform {
        let mut state = seed;
        let notes: Vec<f64> = (0..seconds * 4)
            .map(|_| {
                state = state
                    .wrapping_mul(6364136223846793005)
                    .wrapping_add(1442695040888963407);
                200.0 + ((state >> 33) % 3000) as f64
            })
            .collect();
        let note_len = RATE as usize / 4;
        let samples = (0..seconds * RATE as usize)
            .map(|i| {
                let freq = notes[(i / note_len).min(notes.len() - 1)];
                let t = i as f64 / RATE as f64;
                (0.5 * (2.0 * std::f64::consts::PI * freq * t).sin()
                    + 0.2 * (2.0 * std::f64::consts::PI * freq * 1.5 * t).sin()) as f32
            })
            .collect();
        Waveform::new(samples, RATE)
    }

    fn recognizer() -> Recognizer<MemoryBackend> {
        Recognizer::new(
            Arc::new(MemoryBackend::new()),
            &SongmarkConfig::default(),
            MatchingConfig::lenient(),
        )
        .unwrap()
    }

    #[tokio::test]
    async fn test_index_then_identify() {
        let recognizer = recognizer();
        let a = melody(1, 8);
        let b = melody(2, 8);

        assert!(recognizer.index_song((&a).into(), "a").await.unwrap() > 0);
        assert!(recognizer.index_song((&b).into(), "b").await.unwrap() > 0);

        let result = recognizer.identify_song((&a).into()).await.unwrap();
        assert_eq!(result.status, MatchStatus::Matched);
        assert_eq!(result.song_id.as_deref(), Some("a"));
        assert_eq!(result.offset_seconds, Some(0.0));
    }

    #[tokio::test]
    async fn test_excerpt_identified_with_offset() {
        let recognizer = recognizer();
        let song = melody(3, 10);
        recognizer.index_song((&song).into(), "song").await.unwrap();
        recognizer
            .index_song((&melody(4, 10)).into(), "other")
            .await
            .unwrap();

        // start on a hop boundary so frames line up with the indexed ones
        let start = 512 * 43;
        let end = start + 5 * RATE as usize;
        let excerpt = Waveform::new(song.samples[start..end].to_vec(), RATE);
        let result = recognizer.identify_song((&excerpt).into()).await.unwrap();

        assert_eq!(result.song_id.as_deref(), Some("song"));
        let expected = -(start as f64) / RATE as f64;
        let offset = result.offset_seconds.unwrap();
        assert!((offset - expected).abs() <= 0.011, "offset {offset}");
    }

    #[tokio::test]
    async fn test_duplicate_song_rejected() {
        let recognizer = recognizer();
        let song = melody(5, 3);
        recognizer.index_song((&song).into(), "x").await.unwrap();
        let err = recognizer.index_song((&song).into(), "x").await.unwrap_err();
        assert!(matches!(err, Error::DuplicateSong(id) if id == "x"));
    }

    #[tokio::test]
    async fn test_short_and_empty_audio() {
        let recognizer = recognizer();
        let short = Waveform::new(vec![0.1; 1000], RATE);
        assert!(matches!(
            recognizer.identify_song((&short).into()).await,
            Err(Error::WaveformTooShort { samples: 1000, .. })
        ));
        let empty = Waveform::new(Vec::new(), RATE);
        assert!(matches!(
            recognizer.index_song((&empty).into(), "e").await,
            Err(Error::EmptyWaveform)
        ));
    }

    #[tokio::test]
    async fn test_unknown_audio_not_matched() {
        let recognizer = recognizer();
        recognizer.index_song((&melody(6, 5)).into(), "known").await.unwrap();
        let silence = Waveform::new(vec![0.0; 3 * RATE as usize], RATE);
        let result = recognizer.identify_song((&silence).into()).await.unwrap();
        assert_eq!(result.status, MatchStatus::NotInDb);
        assert_eq!(result.votes, 0);
    }

    #[test]
    fn test_waveform_resampled_to_analysis_rate() {
        let fingerprinter = Fingerprinter::new(&SongmarkConfig::default()).unwrap();
        let song = melody(7, 2);
        let doubled = Waveform::new(
            song.samples.iter().flat_map(|&s| [s, s]).collect(),
            RATE * 2,
        );
        let loaded = fingerprinter.load((&doubled).into()).unwrap();
        assert_eq!(loaded.sample_rate, RATE);
        assert_eq!(loaded.samples.len(), song.samples.len());

        let same = fingerprinter.load((&song).into()).unwrap();
        assert!(matches!(same, Cow::Borrowed(_)));
    }

    /// Tone with raised-cosine fades so its onset does not splatter
    fn faded_tone(freq: f64, rate: u32, seconds: f64) -> Waveform {
        let len = (seconds * rate as f64) as usize;
        let fade = rate as usize / 20;
        let samples = (0..len)
            .map(|i| {
                let edge = i.min(len - 1 - i);
                let gain = if edge < fade {
                    0.5 - 0.5 * (std::f64::consts::PI * edge as f64 / fade as f64).cos()
                } else {
                    1.0
                };
                let t = i as f64 / rate as f64;
                (0.5 * gain * (2.0 * std::f64::consts::PI * freq * t).sin()) as f32
            })
            .collect();
        Waveform::new(samples, rate)
    }

    fn peaks_after_load(fingerprinter: &Fingerprinter, waveform: &Waveform) -> Vec<Peak> {
        let loaded = fingerprinter.load(waveform.into()).unwrap();
        let spectrogram = fingerprinter
            .spectrogram
            .build(&loaded.samples, loaded.sample_rate)
            .unwrap();
        fingerprinter.peak_picker.pick(&spectrogram)
    }

    #[test]
    fn test_tone_above_analysis_nyquist_does_not_alias() {
        let fingerprinter = Fingerprinter::new(&SongmarkConfig::default()).unwrap();
        // 15 kHz at 44.1 kHz would fold onto 7050 Hz without a low-pass
        let peaks = peaks_after_load(&fingerprinter, &faded_tone(15000.0, 44100, 3.0));
        let aliased: Vec<_> = peaks
            .iter()
            .filter(|p| (p.freq - 7050.0).abs() < 300.0)
            .collect();
        assert!(aliased.is_empty(), "aliased peaks: {:?}", aliased);
    }

    #[test]
    fn test_tone_below_analysis_nyquist_survives_resampling() {
        let fingerprinter = Fingerprinter::new(&SongmarkConfig::default()).unwrap();
        let peaks = peaks_after_load(&fingerprinter, &faded_tone(1000.0, 44100, 3.0));
        assert!(!peaks.is_empty());
        assert!(peaks.iter().any(|p| (p.freq - 1000.0).abs() < 15.0));
    }

    #[tokio::test]
    async fn test_wav_file_with_metadata() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("song.wav");
        let song = melody(8, 6);
        let spec = hound::WavSpec {
            channels: 1,
            sample_rate: RATE,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        };
        let mut writer = hound::WavWriter::create(&path, spec).unwrap();
        for &s in &song.samples {
            writer.write_sample((s * 32767.0) as i16).unwrap();
        }
        writer.finalize().unwrap();

        let recognizer: Recognizer = Recognizer::new(
            Arc::new(MemoryBackend::new()) as Arc<dyn StorageBackend>,
            &SongmarkConfig::default(),
            MatchingConfig::lenient(),
        )
        .unwrap();
        let metadata = SongMetadata {
            artist: Some("Test Artist".into()),
            ..SongMetadata::new("wav-song", "Test Title")
        };
        recognizer
            .index_song_with_metadata(path.as_path().into(), &metadata)
            .await
            .unwrap();

        let result = recognizer.identify_song((&song).into()).await.unwrap();
        assert_eq!(result.song_id.as_deref(), Some("wav-song"));
        assert_eq!(
            recognizer.song_metadata("wav-song").await.unwrap(),
            Some(metadata)
        );
    }
}
