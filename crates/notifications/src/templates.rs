//! Message templates and `{{ name }}` interpolation.

use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};

use chrono::{Datelike, Utc};
use thiserror::Error;
use tracing::{debug, info};

use crate::types::EventType;

/// Subject and body text with `{{ name }}` placeholders.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Template {
    pub subject: String,
    pub body: String,
}

impl Template {
    pub fn new(subject: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            subject: subject.into(),
            body: body.into(),
        }
    }

    /// Parse the file format: `Subject: ...` on the first line, a blank line, then the body.
    pub fn parse(text: &str) -> Result<Self, TemplateError> {
        let (first, rest) = text.split_once('\n').unwrap_or((text, ""));
        let subject = first
            .trim_end_matches('\r')
            .strip_prefix("Subject:")
            .ok_or(TemplateError::MissingSubject)?
            .trim();

        let body = rest
            .strip_prefix("\r\n")
            .or_else(|| rest.strip_prefix('\n'))
            .unwrap_or(rest);

        Ok(Self::new(subject, body))
    }
}

/// Source of templates by event type.
pub trait TemplateStore: Send + Sync {
    fn template(&self, event_type: EventType) -> Option<Template>;
}

/// Templates compiled into the binary.
#[derive(Debug, Clone, Copy, Default)]
pub struct BuiltinTemplates;

impl TemplateStore for BuiltinTemplates {
    fn template(&self, event_type: EventType) -> Option<Template> {
        let (subject, body) = match event_type {
            EventType::UserWelcome => (
                "Welcome to {{ platform_name }} - Find your desired jobs with ease!",
                "Hi {{ first_name }},\n\n\
                 Thanks for joining {{ platform_name }}. Browse open positions, save the ones\n\
                 you like and apply in a few clicks.\n\n\
                 Questions? Write to {{ support_email }}.\n\n\
                 (c) {{ current_year }} {{ platform_name }}\n",
            ),
            EventType::EmployerWelcome => (
                "Welcome to {{ platform_name }} - Start Hiring the Best Talent!",
                "Hello {{ company_name }},\n\n\
                 Your employer account on {{ platform_name }} is ready. Post your first job\n\
                 and start reviewing applications.\n\n\
                 Questions? Write to {{ support_email }}.\n\n\
                 (c) {{ current_year }} {{ platform_name }}\n",
            ),
            EventType::ApplicationSubmitted => (
                "Your application for {{ job_title }} has been submitted!",
                "Hi {{ first_name }},\n\n\
                 Your application for {{ job_title }} at {{ company }} has been received.\n\
                 We will let you know when the employer reviews it.\n\n\
                 Questions? Write to {{ support_email }}.\n\n\
                 (c) {{ current_year }} {{ platform_name }}\n",
            ),
            EventType::ApplicationStatusChanged => (
                "Your application for {{ job_title }} is now {{ status }}",
                "Hi {{ first_name }},\n\n\
                 The status of your application for {{ job_title }} at {{ company }} changed\n\
                 from {{ previous_status }} to {{ status }}.\n\n\
                 Questions? Write to {{ support_email }}.\n\n\
                 (c) {{ current_year }} {{ platform_name }}\n",
            ),
            EventType::JobPosted => (
                "Your job {{ job_title }} is live on {{ platform_name }}",
                "Hello {{ company }},\n\n\
                 Your posting \"{{ job_title }}\" is now visible to job seekers.\n\n\
                 Questions? Write to {{ support_email }}.\n\n\
                 (c) {{ current_year }} {{ platform_name }}\n",
            ),
        };
        Some(Template::new(subject, body))
    }
}

#[derive(Debug, Error)]
pub enum TemplateError {
    #[error("template file must start with a 'Subject:' line")]
    MissingSubject,

    #[error("failed to read template {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid template {path}: {reason}")]
    Invalid { path: PathBuf, reason: String },
}

/// Templates loaded from `<event_type>.txt` files, with built-in fallback.
#[derive(Debug, Clone, Default)]
pub struct DirectoryTemplates {
    overrides: HashMap<EventType, Template>,
}

impl DirectoryTemplates {
    /// Load every `<event_type>.txt` present in `dir`. Missing files fall back to the built-ins.
    pub fn load(dir: impl AsRef<Path>) -> Result<Self, TemplateError> {
        let dir = dir.as_ref();
        let mut overrides = HashMap::new();

        for event_type in EventType::ALL {
            let path = dir.join(format!("{event_type}.txt"));
            let text = match std::fs::read_to_string(&path) {
                Ok(text) => text,
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                    debug!(event_type = %event_type, path = %path.display(), "no template override");
                    continue;
                }
                Err(source) => return Err(TemplateError::Io { path, source }),
            };
            let template = Template::parse(&text).map_err(|e| TemplateError::Invalid {
                path: path.clone(),
                reason: e.to_string(),
            })?;
            overrides.insert(event_type, template);
        }

        info!(dir = %dir.display(), overrides = overrides.len(), "loaded e-mail templates");
        Ok(Self { overrides })
    }

    pub fn overrides(&self) -> usize {
        self.overrides.len()
    }
}

impl TemplateStore for DirectoryTemplates {
    fn template(&self, event_type: EventType) -> Option<Template> {
        self.overrides
            .get(&event_type)
            .cloned()
            .or_else(|| BuiltinTemplates.template(event_type))
    }
}

/// Context values every message can reference; events may override them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderDefaults {
    pub platform_name: String,
    pub support_email: String,
}

impl Default for RenderDefaults {
    fn default() -> Self {
        Self {
            platform_name: "JobBoard".to_string(),
            support_email: "support@jobboard.local".to_string(),
        }
    }
}

impl RenderDefaults {
    /// Merge the defaults (plus `current_year`) under an event's own context.
    pub fn context_for(&self, event_context: &BTreeMap<String, String>) -> BTreeMap<String, String> {
        let mut context = BTreeMap::from([
            ("platform_name".to_string(), self.platform_name.clone()),
            ("support_email".to_string(), self.support_email.clone()),
            ("current_year".to_string(), Utc::now().year().to_string()),
        ]);
        context.extend(event_context.iter().map(|(k, v)| (k.clone(), v.clone())));
        context
    }
}

/// Replace `{{ name }}` placeholders with values from `context`.
///
/// Unknown names render as the empty string. An unclosed `{{` is kept literally.
pub fn render(text: &str, context: &BTreeMap<String, String>) -> String {
    let mut out = String::with_capacity(text.len());
    let mut rest = text;

    while let Some(open) = rest.find("{{") {
        out.push_str(&rest[..open]);
        let after_open = &rest[open + 2..];
        match after_open.find("}}") {
            Some(close) => {
                let name = after_open[..close].trim();
                if let Some(value) = context.get(name) {
                    out.push_str(value);
                }
                rest = &after_open[close + 2..];
            }
            None => {
                out.push_str(&rest[open..]);
                rest = "";
            }
        }
    }
    out.push_str(rest);
    out
}
