/// Where the instruction preamble goes in a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PreamblePlacement {
    /// Sent as a leading `system` message.
    System,
    /// Folded into a leading `user` message, for models that reject the system role.
    User,
}

/// Request shaping for one completion model.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelProfile {
    pub name: String,
    pub label: String,
    pub stream: bool,
    pub preamble: PreamblePlacement,
}

impl ModelProfile {
    pub fn new(name: &str, label: &str, stream: bool, preamble: PreamblePlacement) -> Self {
        Self {
            name: name.to_string(),
            label: label.to_string(),
            stream,
            preamble,
        }
    }

    /// Look a model up in the catalog, falling back to a streaming profile
    /// with a system preamble for ids we don't know about.
    pub fn resolve(name: &str) -> Self {
        catalog()
            .into_iter()
            .find(|m| m.name == name)
            .unwrap_or_else(|| Self::new(name, name, true, PreamblePlacement::System))
    }

    pub fn with_stream(mut self, stream: bool) -> Self {
        self.stream = stream;
        self
    }
}

pub const DEFAULT_MODEL: &str = "gpt-4o-mini";

pub fn catalog() -> Vec<ModelProfile> {
    vec![
        ModelProfile::new("gpt-4o-mini", "GPT-4o Mini", true, PreamblePlacement::System),
        ModelProfile::new("gpt-4o-2024-08-06", "GPT-4o", true, PreamblePlacement::System),
        ModelProfile::new("o1-mini-2024-09-12", "o1 Mini", false, PreamblePlacement::User),
        ModelProfile::new("o1-preview", "o1 Preview", false, PreamblePlacement::User),
    ]
}
