//! Built-in pipeline components.

use std::fmt;
use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::doc::Doc;
use crate::error::{Result, UmamiError};
use crate::ner::features::word_shape;
use crate::ner::{EntityRecognizer, NerConfig};

const CFG_FILE: &str = "cfg.json";

/// Marks sentence starts after sentence-final punctuation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Sentencizer {
    pub punct_chars: Vec<String>,
}

impl Default for Sentencizer {
    fn default() -> Self {
        Self {
            punct_chars: [".", "!", "?"].iter().map(|s| s.to_string()).collect(),
        }
    }
}

impl Sentencizer {
    pub fn process(&self, doc: &mut Doc) {
        let mut next_starts = true;
        for i in 0..doc.len() {
            doc.set_sent_start(i, next_starts);
            next_starts = self.punct_chars.contains(&doc.tokens()[i].text);
        }
    }
}

/// Annotates every token with its orthographic shape.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Shaper {}

impl Shaper {
    pub fn process(&self, doc: &mut Doc) {
        for i in 0..doc.len() {
            let shape = word_shape(&doc.tokens()[i].text);
            doc.set_shape(i, shape);
        }
    }
}

/// Kind tag stored in snapshot metadata.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ComponentKind {
    Sentencizer,
    Shaper,
    EntityRecognizer,
}

impl fmt::Display for ComponentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ComponentKind::Sentencizer => write!(f, "sentencizer"),
            ComponentKind::Shaper => write!(f, "shaper"),
            ComponentKind::EntityRecognizer => write!(f, "entity_recognizer"),
        }
    }
}

/// A pipeline stage implementation.
pub enum Component {
    Sentencizer(Sentencizer),
    Shaper(Shaper),
    EntityRecognizer(EntityRecognizer),
}

impl Component {
    /// Fresh entity recognizer with no labels.
    pub fn entity_recognizer(config: NerConfig) -> Result<Self> {
        Ok(Component::EntityRecognizer(EntityRecognizer::new(config)?))
    }

    pub fn kind(&self) -> ComponentKind {
        match self {
            Component::Sentencizer(_) => ComponentKind::Sentencizer,
            Component::Shaper(_) => ComponentKind::Shaper,
            Component::EntityRecognizer(_) => ComponentKind::EntityRecognizer,
        }
    }

    pub fn process(&self, doc: &mut Doc) -> Result<()> {
        match self {
            Component::Sentencizer(s) => s.process(doc),
            Component::Shaper(s) => s.process(doc),
            Component::EntityRecognizer(ner) => ner.process(doc)?,
        }
        Ok(())
    }

    pub fn to_disk(&self, dir: &Path) -> Result<()> {
        fs::create_dir_all(dir)?;
        match self {
            Component::Sentencizer(s) => {
                fs::write(dir.join(CFG_FILE), serde_json::to_string_pretty(s)?)?
            }
            Component::Shaper(s) => fs::write(dir.join(CFG_FILE), serde_json::to_string_pretty(s)?)?,
            Component::EntityRecognizer(ner) => ner.to_disk(dir)?,
        }
        Ok(())
    }

    pub fn from_disk(kind: ComponentKind, dir: &Path) -> Result<Self> {
        let read_cfg = || -> Result<String> {
            let path = dir.join(CFG_FILE);
            if !path.exists() {
                return Err(UmamiError::SnapshotNotFound(path));
            }
            Ok(fs::read_to_string(path)?)
        };

        Ok(match kind {
            ComponentKind::Sentencizer => Component::Sentencizer(serde_json::from_str(&read_cfg()?)?),
            ComponentKind::Shaper => Component::Shaper(serde_json::from_str(&read_cfg()?)?),
            ComponentKind::EntityRecognizer => {
                Component::EntityRecognizer(EntityRecognizer::from_disk(dir)?)
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tokenizer::Tokenizer;

    fn doc(text: &str) -> Doc {
        Doc::new(text, Tokenizer::new().unwrap().tokenize(text))
    }

    #[test]
    fn test_sentencizer() {
        let mut d = doc("alot of fun to experience.The food sublime! Yes");
        Sentencizer::default().process(&mut d);

        assert!(d.is_sent_start(0));
        assert!(!d.is_sent_start(1));
        assert!(d.is_sent_start(6)); // "The"
        assert!(d.is_sent_start(10)); // "Yes"
        assert_eq!(d.sent_count(), 3);
    }

    #[test]
    fn test_shaper() {
        let mut d = doc("IT IS Special");
        Shaper::default().process(&mut d);
        assert_eq!(d.shape(0), Some("XX"));
        assert_eq!(d.shape(2), Some("Xxxxx"));
    }

    #[test]
    fn test_component_disk_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let component = Component::Sentencizer(Sentencizer {
            punct_chars: vec![";".into()],
        });
        component.to_disk(dir.path()).unwrap();

        match Component::from_disk(ComponentKind::Sentencizer, dir.path()).unwrap() {
            Component::Sentencizer(s) => assert_eq!(s.punct_chars, [";"]),
            _ => panic!("wrong component kind"),
        }
    }

    #[test]
    fn test_missing_component_cfg() {
        let dir = tempfile::tempdir().unwrap();
        let err = Component::from_disk(ComponentKind::Shaper, dir.path()).err().unwrap();
        assert!(err.is_not_found());
    }
}
