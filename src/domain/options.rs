use serde::{Deserialize, Serialize};

pub const DEFAULT_SAMPLE: u32 = 10;
pub const DEFAULT_HOST: &str = "http://localhost/a.png?";

/// Runtime options of a beacon. An empty `app` disables delivery entirely.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Options {
    pub app: String,
    pub sample: u32,
    #[serde(alias = "nick")]
    pub nickname: String,
    pub host: String,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            app: String::new(),
            sample: DEFAULT_SAMPLE,
            nickname: String::new(),
            host: DEFAULT_HOST.to_string(),
        }
    }
}

impl Options {
    pub fn from_patch(patch: OptionsPatch) -> Self {
        let mut options = Self::default();
        options.merge(patch);
        options
    }

    /// Shallow override: only keys present on `patch` replace current values.
    pub fn merge(&mut self, patch: OptionsPatch) {
        if let Some(app) = patch.app {
            self.app = app;
        }
        if let Some(sample) = patch.sample {
            self.sample = sample;
        }
        if let Some(nickname) = patch.nickname {
            self.nickname = nickname;
        }
        if let Some(host) = patch.host {
            self.host = host;
        }
    }

    pub fn is_enabled(&self) -> bool {
        !self.app.is_empty()
    }

    /// Resolves `forced || sample || 1`, with zero treated as unset.
    pub fn sample_denominator(&self, forced: Option<u32>) -> u32 {
        forced
            .filter(|n| *n > 0)
            .or_else(|| (self.sample > 0).then_some(self.sample))
            .unwrap_or(1)
    }
}

/// Partial options; `None` leaves the current value untouched on merge.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct OptionsPatch {
    pub app: Option<String>,
    pub sample: Option<u32>,
    #[serde(alias = "nick")]
    pub nickname: Option<String>,
    pub host: Option<String>,
}

impl OptionsPatch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn app(mut self, app: impl Into<String>) -> Self {
        self.app = Some(app.into());
        self
    }

    pub fn sample(mut self, sample: u32) -> Self {
        self.sample = Some(sample);
        self
    }

    pub fn nickname(mut self, nickname: impl Into<String>) -> Self {
        self.nickname = Some(nickname.into());
        self
    }

    pub fn host(mut self, host: impl Into<String>) -> Self {
        self.host = Some(host.into());
        self
    }

    pub fn is_empty(&self) -> bool {
        self.app.is_none() && self.sample.is_none() && self.nickname.is_none() && self.host.is_none()
    }
}
