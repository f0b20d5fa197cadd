//! Scripted input: a TOML list of events to dispatch at given frames.
//!
//! ```toml
//! [[event]]
//! frame = 2
//! kind = "keydown"
//! code = "KeyW"
//!
//! [[event]]
//! frame = 5
//! target = "canvas"
//! kind = "mousedown"
//! button = 0
//! x = 120
//! y = 48
//! ```

use std::path::Path;

use anyhow::{bail, Context};
use hostlink_abi::event::EventKind;
use hostlink_runtime::host::event::{EventRecord, Touch};
use serde::Deserialize;

#[derive(Debug, Clone, Default, Deserialize)]
pub struct EventScript {
    #[serde(default, rename = "event")]
    pub events: Vec<ScriptedEvent>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ScriptedEvent {
    pub frame: u32,
    /// Element id; the configured canvas when absent.
    pub target: Option<String>,
    pub kind: String,
    pub code: String,
    pub repeat: bool,
    pub button: i16,
    /// Touch identifier.
    pub id: i32,
    pub x: i32,
    pub y: i32,
    pub dx: f64,
    pub dy: f64,
    pub dz: f64,
}

impl EventScript {
    pub fn from_toml_str(text: &str) -> anyhow::Result<Self> {
        let script: EventScript = toml::from_str(text)?;
        for (i, event) in script.events.iter().enumerate() {
            event.kind().with_context(|| format!("event #{i}"))?;
        }
        Ok(script)
    }

    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("reading {}", path.display()))?;
        Self::from_toml_str(&text).with_context(|| format!("parsing {}", path.display()))
    }

    /// Events scheduled for `frame`, in script order.
    pub fn at_frame(&self, frame: u32) -> impl Iterator<Item = &ScriptedEvent> {
        self.events.iter().filter(move |e| e.frame == frame)
    }

    /// Events that fall after the last frame of a run.
    pub fn unreached(&self, frames: u32) -> usize {
        self.events.iter().filter(|e| e.frame >= frames).count()
    }
}

impl ScriptedEvent {
    pub fn kind(&self) -> anyhow::Result<EventKind> {
        match EventKind::from_event_type(&self.kind) {
            Some(kind) => Ok(kind),
            None => bail!("unknown event kind {:?}", self.kind),
        }
    }

    pub fn target<'a>(&'a self, default: &'a str) -> &'a str {
        self.target.as_deref().unwrap_or(default)
    }

    pub fn to_record(&self) -> anyhow::Result<EventRecord> {
        let kind = self.kind()?;
        Ok(if kind.is_keyboard() {
            EventRecord::key(kind, self.code.clone(), self.repeat)
        } else if kind.is_mouse() {
            EventRecord::mouse(kind, self.button, self.x, self.y)
        } else if kind.is_touch() {
            let touch = Touch {
                identifier: self.id,
                screen_x: self.x,
                screen_y: self.y,
            };
            EventRecord::touch(kind, vec![touch])
        } else {
            EventRecord::wheel(self.dx, self.dy, self.dz)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SCRIPT: &str = r#"
[[event]]
frame = 0
kind = "keydown"
code = "KeyW"

[[event]]
frame = 2
target = "hud"
kind = "wheel"
dy = -3.0

[[event]]
frame = 2
kind = "touchstart"
id = 4
x = 10
y = 20
"#;

    #[test]
    fn test_parse_and_schedule() {
        let script = EventScript::from_toml_str(SCRIPT).unwrap();
        assert_eq!(script.events.len(), 3);
        assert_eq!(script.at_frame(2).count(), 2);
        assert_eq!(script.at_frame(1).count(), 0);
        assert_eq!(script.unreached(2), 2);

        let key = script.events[0].to_record().unwrap();
        assert_eq!(key.kind(), EventKind::KeyDown);
        assert_eq!(key.code(), Some("KeyW"));
        assert_eq!(script.events[0].target("canvas"), "canvas");

        let wheel = script.events[1].to_record().unwrap();
        assert_eq!(wheel.wheel_delta(), Some([0.0, -3.0, 0.0]));
        assert_eq!(script.events[1].target("canvas"), "hud");

        let touch = script.events[2].to_record().unwrap();
        let changed = touch.changed_touches().unwrap();
        assert_eq!(changed[0].identifier, 4);
        assert_eq!((changed[0].screen_x, changed[0].screen_y), (10, 20));
    }

    #[test]
    fn test_rejects_unknown_kind() {
        let err = EventScript::from_toml_str("[[event]]\nkind = \"keypress\"\n").unwrap_err();
        assert!(format!("{err:#}").contains("keypress"));
    }

    #[test]
    fn test_empty_script() {
        assert!(EventScript::from_toml_str("").unwrap().events.is_empty());
    }
}
