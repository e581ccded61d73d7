//! One user's run through the tool: upload, split, score parts with
//! generated audio, archive, download.
//!
//! A [`Session`] is plain data with one method per action. Collaborators are
//! passed to each action, so any front end (wizard, scripted run, tests) can
//! drive the same state machine.

use std::fs;
use std::path::{Path, PathBuf};

use tracing::{debug, info};

use crate::archive::archive_files;
use crate::audio::{AudioGenerator, AudioPrompt, GeneratedAudio};
use crate::config::Device;
use crate::error::{Result, VidriffError};
use crate::spectrogram::SpectrogramParams;
use crate::video::{attach_audio, split_video, AttachOutcome, VideoEditor, VideoPart};

/// Where a session is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Empty,
    VideoUploaded,
    Split,
    Archived,
}

impl std::fmt::Display for SessionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SessionState::Empty => write!(f, "empty"),
            SessionState::VideoUploaded => write!(f, "video uploaded"),
            SessionState::Split => write!(f, "split"),
            SessionState::Archived => write!(f, "archived"),
        }
    }
}

/// Result of a generate+attach action.
#[derive(Debug, Clone)]
pub struct ScoredPart {
    pub part: VideoPart,
    pub audio: GeneratedAudio,
    pub attach: AttachOutcome,
    pub width: u32,
    pub archive: PathBuf,
}

#[derive(Debug, Clone)]
pub struct Session {
    input_video: Option<PathBuf>,
    output_dir: Option<PathBuf>,
    parts: Vec<VideoPart>,
    selected_part: usize,
    archive: Option<PathBuf>,
    last_output: Option<PathBuf>,
}

impl Default for Session {
    fn default() -> Self {
        Self::new()
    }
}

impl Session {
    pub fn new() -> Self {
        Self {
            input_video: None,
            output_dir: None,
            parts: Vec::new(),
            selected_part: 1,
            archive: None,
            last_output: None,
        }
    }

    pub fn state(&self) -> SessionState {
        if self.input_video.is_none() {
            SessionState::Empty
        } else if self.parts.is_empty() {
            SessionState::VideoUploaded
        } else if self.archive.is_none() {
            SessionState::Split
        } else {
            SessionState::Archived
        }
    }

    pub fn input_video(&self) -> Option<&Path> {
        self.input_video.as_deref()
    }

    pub fn output_dir(&self) -> Option<&Path> {
        self.output_dir.as_deref()
    }

    /// Every part produced so far, in creation order.
    pub fn parts(&self) -> &[VideoPart] {
        &self.parts
    }

    pub fn part_paths(&self) -> Vec<PathBuf> {
        self.parts.iter().map(|p| p.path.clone()).collect()
    }

    /// 1-based index into [`Session::parts`].
    pub fn selected_part(&self) -> usize {
        self.selected_part
    }

    pub fn archive(&self) -> Option<&Path> {
        self.archive.as_deref()
    }

    pub fn last_output(&self) -> Option<&Path> {
        self.last_output.as_deref()
    }

    fn require(&self, allowed: &[SessionState], action: &str) -> Result<()> {
        let state = self.state();
        if allowed.contains(&state) {
            Ok(())
        } else {
            Err(VidriffError::InvalidState(format!(
                "cannot {action} while the session is {state}"
            )))
        }
    }

    fn require_parts(&self, action: &str) -> Result<()> {
        self.require(&[SessionState::Split, SessionState::Archived], action)
    }

    /// Copy `source` into `work_dir` and make it the session's video.
    pub fn upload(&mut self, source: &Path, work_dir: &Path) -> Result<&Path> {
        self.require(&[SessionState::Empty], "upload a video")?;

        if !source.is_file() {
            return Err(VidriffError::FileNotFound(source.display().to_string()));
        }
        let file_name = source.file_name().ok_or_else(|| {
            VidriffError::InvalidInput(format!("{} has no file name", source.display()))
        })?;

        fs::create_dir_all(work_dir)?;
        let destination = work_dir.join(file_name);
        let same_file = destination.exists()
            && fs::canonicalize(&destination)? == fs::canonicalize(source)?;
        if !same_file {
            fs::copy(source, &destination)?;
        }

        info!("Uploaded {}", destination.display());
        Ok(self.input_video.insert(destination).as_path())
    }

    /// Split the uploaded video into `n_parts` parts written to `output_dir`.
    ///
    /// A new split starts a new part set: the previous list, selection and
    /// archive reference are replaced. On failure the session is unchanged.
    pub async fn split(
        &mut self,
        editor: &dyn VideoEditor,
        n_parts: usize,
        output_dir: &Path,
    ) -> Result<&[VideoPart]> {
        self.require(
            &[
                SessionState::VideoUploaded,
                SessionState::Split,
                SessionState::Archived,
            ],
            "split",
        )?;
        let source = self
            .input_video
            .clone()
            .ok_or_else(|| VidriffError::InvalidState("no video uploaded".to_string()))?;

        let parts = split_video(editor, &source, n_parts, output_dir).await?;

        self.output_dir = Some(output_dir.to_path_buf());
        self.parts = parts;
        self.selected_part = 1;
        self.archive = None;
        self.last_output = None;

        Ok(&self.parts)
    }

    /// Choose which part (1-based) the next generated audio goes onto.
    pub fn select_part(&mut self, part: usize) -> Result<&VideoPart> {
        self.require_parts("select a part")?;
        if part == 0 || part > self.parts.len() {
            return Err(VidriffError::InvalidInput(format!(
                "part must be between 1 and {}, got {part}",
                self.parts.len()
            )));
        }
        self.selected_part = part;
        Ok(&self.parts[part - 1])
    }

    fn current_part(&self) -> Result<&VideoPart> {
        self.parts.get(self.selected_part - 1).ok_or_else(|| {
            VidriffError::InvalidState(format!("part {} does not exist", self.selected_part))
        })
    }

    /// Generate audio long enough for the selected part.
    ///
    /// The prompt is validated before anything else runs. Returns the audio
    /// and the spectrogram width that was requested.
    pub async fn generate(
        &self,
        editor: &dyn VideoEditor,
        generator: &dyn AudioGenerator,
        prompt: AudioPrompt,
        spectrogram: &SpectrogramParams,
        device: Device,
        work_dir: &Path,
    ) -> Result<(GeneratedAudio, u32)> {
        prompt.validate()?;
        self.require_parts("generate audio")?;

        let part = self.current_part()?;
        let duration = editor.probe_duration(&part.path).await?;
        let width = spectrogram.padded_width(duration)?;
        debug!(
            "Part {} lasts {:.2}s, requesting width {} (margin {})",
            part.number,
            duration.as_secs_f64(),
            width,
            spectrogram.tail_margin
        );

        let request = prompt.into_request(width, spectrogram.height, device);
        let audio = generator.generate(&request, work_dir).await?;
        Ok((audio, width))
    }

    /// Put `audio` on the selected part, append the new variant and write a
    /// fresh archive of the whole list.
    ///
    /// If archiving fails the variant stays in the list and the session has no
    /// current archive until [`Session::create_archive`] succeeds.
    pub async fn attach(
        &mut self,
        editor: &dyn VideoEditor,
        audio: &GeneratedAudio,
        archive_dir: &Path,
    ) -> Result<(VideoPart, AttachOutcome, PathBuf)> {
        self.require_parts("attach audio")?;
        let output_dir = self
            .output_dir
            .clone()
            .ok_or_else(|| VidriffError::InvalidState("no output directory".to_string()))?;

        let source = self.current_part()?.clone();
        let variant = VideoPart::with_audio(source.number, &output_dir);

        let outcome = attach_audio(
            editor,
            &source.path,
            &audio.audio_path,
            &variant.path,
            audio.duration,
        )
        .await?;

        self.parts.push(variant.clone());
        self.last_output = Some(variant.path.clone());
        info!(
            "Audio added to video part {} and saved as {}",
            self.selected_part,
            variant.path.display()
        );

        // The previous archive lacks the new variant.
        let archive = match self.create_archive(archive_dir) {
            Ok(archive) => archive,
            Err(e) => {
                self.archive = None;
                return Err(e);
            }
        };
        Ok((variant, outcome, archive))
    }

    /// Generate audio for the selected part and attach it.
    #[allow(clippy::too_many_arguments)]
    pub async fn generate_and_attach(
        &mut self,
        editor: &dyn VideoEditor,
        generator: &dyn AudioGenerator,
        prompt: AudioPrompt,
        spectrogram: &SpectrogramParams,
        device: Device,
        work_dir: &Path,
        archive_dir: &Path,
    ) -> Result<ScoredPart> {
        let (audio, width) = self
            .generate(editor, generator, prompt, spectrogram, device, work_dir)
            .await?;
        let (part, attach, archive) = self.attach(editor, &audio, archive_dir).await?;
        Ok(ScoredPart {
            part,
            audio,
            attach,
            width,
            archive,
        })
    }

    /// Bundle every current part into a new archive and make it current.
    pub fn create_archive(&mut self, archive_dir: &Path) -> Result<PathBuf> {
        self.require_parts("archive")?;
        let path = archive_files(&self.part_paths(), archive_dir)?;
        self.archive = Some(path.clone());
        Ok(path)
    }

    /// Hand out the current archive and reset the session.
    pub fn complete_download(&mut self) -> Result<PathBuf> {
        self.require(&[SessionState::Archived], "download")?;
        let archive = self
            .archive
            .take()
            .ok_or_else(|| VidriffError::InvalidState("no archive".to_string()))?;
        self.reset();
        Ok(archive)
    }

    pub fn reset(&mut self) {
        *self = Self::new();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_session_is_empty() {
        let session = Session::new();
        assert_eq!(session.state(), SessionState::Empty);
        assert_eq!(session.selected_part(), 1);
        assert!(session.parts().is_empty());
        assert!(session.archive().is_none());
    }

    #[test]
    fn test_upload_copies_into_work_dir() {
        let dir = tempfile::tempdir().unwrap();
        let source = dir.path().join("clip.mp4");
        fs::write(&source, b"video").unwrap();
        let work = dir.path().join("temp");

        let mut session = Session::new();
        let uploaded = session.upload(&source, &work).unwrap().to_path_buf();

        assert_eq!(uploaded, work.join("clip.mp4"));
        assert_eq!(fs::read(&uploaded).unwrap(), b"video");
        assert_eq!(session.state(), SessionState::VideoUploaded);
    }

    #[test]
    fn test_upload_twice_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let source = dir.path().join("clip.mp4");
        fs::write(&source, b"video").unwrap();

        let mut session = Session::new();
        session.upload(&source, dir.path()).unwrap();
        assert!(matches!(
            session.upload(&source, dir.path()),
            Err(VidriffError::InvalidState(_))
        ));
    }

    #[test]
    fn test_upload_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let mut session = Session::new();
        assert!(matches!(
            session.upload(&dir.path().join("nope.mp4"), dir.path()),
            Err(VidriffError::FileNotFound(_))
        ));
        assert_eq!(session.state(), SessionState::Empty);
    }

    #[test]
    fn test_actions_need_parts() {
        let dir = tempfile::tempdir().unwrap();
        let mut session = Session::new();
        assert!(matches!(
            session.select_part(1),
            Err(VidriffError::InvalidState(_))
        ));
        assert!(matches!(
            session.create_archive(dir.path()),
            Err(VidriffError::InvalidState(_))
        ));
        assert!(matches!(
            session.complete_download(),
            Err(VidriffError::InvalidState(_))
        ));
    }

    #[test]
    fn test_state_display() {
        assert_eq!(SessionState::VideoUploaded.to_string(), "video uploaded");
        assert_eq!(SessionState::Archived.to_string(), "archived");
    }
}
