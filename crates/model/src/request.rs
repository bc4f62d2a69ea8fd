use serde_json::Value;

/// A request to be sent to the model provider.
///
/// Every request is self-contained: the roles built on this crate never
/// carry a conversation across calls, so the messages here are the whole
/// context the model sees.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ModelRequest {
    /// The input messages.
    pub messages: Vec<ModelMessage>,
    /// If set, the model is asked to reply with a JSON object conforming to
    /// this format.
    pub response_format: Option<ResponseFormat>,
    /// Sampling temperature, provider default when `None`.
    pub temperature: Option<f32>,
}

impl ModelRequest {
    /// Creates a request made of a system instruction and a user input.
    #[inline]
    pub fn with_instructions<S1: Into<String>, S2: Into<String>>(
        instructions: S1,
        input: S2,
    ) -> Self {
        Self {
            messages: vec![
                ModelMessage::System(instructions.into()),
                ModelMessage::User(input.into()),
            ],
            response_format: None,
            temperature: None,
        }
    }

    /// Requests a structured reply.
    #[inline]
    pub fn with_response_format(mut self, format: ResponseFormat) -> Self {
        self.response_format = Some(format);
        self
    }

    /// Sets the sampling temperature.
    #[inline]
    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }
}

/// A complete message.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum ModelMessage {
    /// The system instructions.
    System(String),
    /// A user input text.
    User(String),
    /// An assistant text.
    Assistant(String),
}

/// Describes the structure the model should reply with.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct ResponseFormat {
    /// Name of the format, used by providers to label the schema.
    pub name: String,
    /// The shape of the reply.
    ///
    /// For most model providers, this should be a
    /// [JSON schema](https://json-schema.org/) describing an object.
    pub schema: Value,
}
