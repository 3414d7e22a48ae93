use serde::{Deserialize, Serialize};

/// Lyrics and metadata as handed over by whichever provider found the song.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SongDetails {
    pub lyrics: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cover_art: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub song_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub artist_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub release_year: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub preview_url: Option<String>,
}

impl SongDetails {
    pub fn new(lyrics: impl Into<String>) -> Self {
        Self {
            lyrics: lyrics.into(),
            ..Self::default()
        }
    }

    /// Song name, or a neutral placeholder when the provider had none.
    pub fn title(&self) -> &str {
        non_blank(&self.song_name).unwrap_or("Untitled")
    }

    pub fn artist(&self) -> Option<&str> {
        non_blank(&self.artist_name)
    }

    pub fn year(&self) -> Option<&str> {
        non_blank(&self.release_year)
    }

    pub fn export_filename(&self, tag: &str) -> String {
        export_filename(self.title(), tag)
    }
}

fn non_blank(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}

/// `"{title}{tag}.png"` with every whitespace run in the title collapsed to a
/// single underscore, leading and trailing runs included. Path separators are
/// replaced as well so the name always stays inside the output directory.
pub fn export_filename(title: &str, tag: &str) -> String {
    let mut stem = String::with_capacity(title.len());
    let mut in_gap = false;
    for ch in title.chars() {
        if ch.is_whitespace() {
            if !in_gap {
                stem.push('_');
            }
            in_gap = true;
            continue;
        }
        in_gap = false;
        stem.push(match ch {
            '/' | '\\' | '\0' => '-',
            other => other,
        });
    }

    if stem.is_empty() || stem == "." || stem == ".." {
        stem = "song".to_string();
    }
    format!("{stem}{tag}.png")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn collapses_whitespace_runs() {
        assert_eq!(export_filename("Bohemian  Rhapsody", "_matrix"), "Bohemian_Rhapsody_matrix.png");
        assert_eq!(export_filename(" Let\tIt \n Be ", "_matrix"), "_Let_It_Be__matrix.png");
    }

    #[test]
    fn display_title_is_trimmed_before_naming() {
        let song = SongDetails {
            song_name: Some("  Let It Be ".to_string()),
            ..SongDetails::default()
        };
        assert_eq!(song.export_filename("_matrix"), "Let_It_Be_matrix.png");
    }

    #[test]
    fn keeps_names_inside_the_output_directory() {
        assert_eq!(export_filename("AC/DC", "_matrix"), "AC-DC_matrix.png");
        assert_eq!(export_filename("..", "_matrix"), "song_matrix.png");
        assert_eq!(export_filename("", "_matrix"), "song_matrix.png");
        assert_eq!(export_filename("   ", "_matrix"), "__matrix.png");
    }

    #[test]
    fn reads_provider_payload() {
        let song: SongDetails = serde_json::from_str(
            r#"{"lyrics":"la la","songName":"Hey Jude","artistName":" ","releaseYear":"1968"}"#,
        )
        .unwrap();

        assert_eq!(song.title(), "Hey Jude");
        assert_eq!(song.artist(), None);
        assert_eq!(song.year(), Some("1968"));
        assert_eq!(song.export_filename("_matrix"), "Hey_Jude_matrix.png");
        assert_eq!(SongDetails::new("x").title(), "Untitled");
    }
}
