//! Message templating for duty announcements
//!
//! Three Handlebars templates are compiled together: the announcement sent
//! when the duty changes hands, the room topic set at the same time, and
//! the ping sent when someone asks a question. Variables are `{{name}}` for
//! the person-on-duty, `{{room}}` for the configured room and `{{asker}}`
//! for whoever asked. The older `<name>` placeholder is accepted too.
//! Output is plain text, so nothing is HTML-escaped.

use handlebars::Handlebars;
use serde::Serialize;

use super::NotifyError;

/// Announcement used when no template is configured
pub const DEFAULT_TEMPLATE: &str = "Today's person-on-duty is {{name}}";

/// Room topic used when no topic template is configured
pub const DEFAULT_TOPIC_TEMPLATE: &str = "Current person on-duty: {{name}}";

/// Question ping used when no question template is configured
pub const DEFAULT_QUESTION_TEMPLATE: &str =
    "Hi sheriff {{name}}, {{asker}} may have asked a question. Could you have a look?";

const ANNOUNCEMENT: &str = "announcement";
const TOPIC: &str = "topic";
const QUESTION: &str = "question";

#[derive(Debug, Serialize)]
struct MessageData<'a> {
    name: &'a str,
    room: Option<&'a str>,
    asker: Option<&'a str>,
}

/// Compiled announcement, topic and question templates
#[derive(Debug)]
pub struct MessageTemplate {
    handlebars: Handlebars<'static>,
    room: Option<String>,
}

impl MessageTemplate {
    /// Compile the announcement `source` next to the default topic and
    /// question templates; fails on Handlebars syntax errors
    pub fn new(source: &str) -> Result<Self, NotifyError> {
        let mut handlebars = Handlebars::new();
        handlebars.register_escape_fn(handlebars::no_escape);

        let mut template = Self {
            handlebars,
            room: None,
        };
        template.register(ANNOUNCEMENT, source)?;
        template.register(TOPIC, DEFAULT_TOPIC_TEMPLATE)?;
        template.register(QUESTION, DEFAULT_QUESTION_TEMPLATE)?;
        Ok(template)
    }

    /// Replace the room topic template
    pub fn with_topic(mut self, source: &str) -> Result<Self, NotifyError> {
        self.register(TOPIC, source)?;
        Ok(self)
    }

    /// Replace the question template
    pub fn with_question(mut self, source: &str) -> Result<Self, NotifyError> {
        self.register(QUESTION, source)?;
        Ok(self)
    }

    /// Set the room exposed as `{{room}}`
    pub fn with_room(mut self, room: Option<String>) -> Self {
        self.room = room;
        self
    }

    /// Render the announcement for `person`
    pub fn render(&self, person: &str) -> Result<String, NotifyError> {
        self.render_named(ANNOUNCEMENT, person, None)
    }

    /// Render the room topic for `person`
    pub fn render_topic(&self, person: &str) -> Result<String, NotifyError> {
        self.render_named(TOPIC, person, None)
    }

    /// Render the ping telling `person` that `asker` asked something
    pub fn render_question(&self, person: &str, asker: &str) -> Result<String, NotifyError> {
        self.render_named(QUESTION, person, Some(asker))
    }

    fn register(&mut self, name: &str, source: &str) -> Result<(), NotifyError> {
        let source = source.replace("<name>", "{{name}}");
        self.handlebars
            .register_template_string(name, source)
            .map_err(|e| NotifyError::Template(e.to_string()))
    }

    fn render_named(
        &self,
        template: &str,
        person: &str,
        asker: Option<&str>,
    ) -> Result<String, NotifyError> {
        let data = MessageData {
            name: person,
            room: self.room.as_deref(),
            asker,
        };
        self.handlebars
            .render(template, &data)
            .map_err(|e| NotifyError::Template(e.to_string()))
    }
}

impl Default for MessageTemplate {
    fn default() -> Self {
        let mut handlebars = Handlebars::new();
        handlebars.register_escape_fn(handlebars::no_escape);
        // The built-in templates are known to compile
        let _ = handlebars.register_template_string(ANNOUNCEMENT, DEFAULT_TEMPLATE);
        let _ = handlebars.register_template_string(TOPIC, DEFAULT_TOPIC_TEMPLATE);
        let _ = handlebars.register_template_string(QUESTION, DEFAULT_QUESTION_TEMPLATE);
        Self {
            handlebars,
            room: None,
        }
    }
}
