//! Output file naming.

use std::path::{Path, PathBuf};

fn output_dir(source: &Path, output_dir: Option<&Path>) -> PathBuf {
    match output_dir {
        Some(dir) => dir.to_path_buf(),
        None => source.parent().map(Path::to_path_buf).unwrap_or_default(),
    }
}

fn stem(path: &Path) -> String {
    path.file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default()
}

/// `<input-stem>track<N>.mid`, N being the 1-based source track number.
pub fn split_track_path(input: &Path, track_number: usize, dir: Option<&Path>) -> PathBuf {
    output_dir(input, dir).join(format!("{}track{}.mid", stem(input), track_number))
}

/// `<split-stem>.<ext>`.
pub fn converted_path(split: &Path, extension: &str, dir: Option<&Path>) -> PathBuf {
    output_dir(split, dir).join(format!("{}.{}", stem(split), extension))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn split_files_sit_next_to_input() {
        assert_eq!(
            split_track_path(Path::new("/music/song.mid"), 2, None),
            PathBuf::from("/music/songtrack2.mid")
        );
        assert_eq!(split_track_path(Path::new("song.mid"), 10, None), PathBuf::from("songtrack10.mid"));
    }

    #[test]
    fn output_dir_overrides_location() {
        let out = Path::new("/tmp/out");
        assert_eq!(
            split_track_path(Path::new("/music/song.mid"), 3, Some(out)),
            PathBuf::from("/tmp/out/songtrack3.mid")
        );
        assert_eq!(
            converted_path(Path::new("/music/songtrack3.mid"), "aiff", Some(out)),
            PathBuf::from("/tmp/out/songtrack3.aiff")
        );
    }

    #[test]
    fn converted_keeps_split_stem() {
        assert_eq!(
            converted_path(Path::new("/music/songtrack2.mid"), "wav", None),
            PathBuf::from("/music/songtrack2.wav")
        );
    }
}
