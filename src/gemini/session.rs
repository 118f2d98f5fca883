//! Chat session: the conversation history plus the declarations and
//! generation settings sent with every request.

use super::{
    ChatModel, Content, FunctionDeclaration, GeminiError, GenerateContentRequest,
    GenerationConfig, Part, Role, Tool,
};

/// Ordered conversation turns, owned by one session
#[derive(Debug, Clone, Default)]
pub struct Conversation {
    turns: Vec<Content>,
}

impl Conversation {
    pub fn push(&mut self, content: Content) {
        self.turns.push(content);
    }

    pub fn turns(&self) -> &[Content] {
        &self.turns
    }

    pub fn len(&self) -> usize {
        self.turns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }

    /// Most recent turn with the given role
    pub fn last_from(&self, role: Role) -> Option<&Content> {
        self.turns.iter().rev().find(|c| c.role == role)
    }

    fn pop(&mut self) -> Option<Content> {
        self.turns.pop()
    }
}

pub struct ChatSession<'a, M: ChatModel + ?Sized> {
    model: &'a M,
    tools: Vec<Tool>,
    generation_config: GenerationConfig,
    history: Conversation,
}

impl<'a, M: ChatModel + ?Sized> ChatSession<'a, M> {
    pub fn new(model: &'a M, temperature: f32) -> Self {
        Self {
            model,
            tools: Vec::new(),
            generation_config: GenerationConfig {
                temperature: Some(temperature),
            },
            history: Conversation::default(),
        }
    }

    /// Offer these functions to the model on every request
    pub fn with_functions(mut self, declarations: Vec<FunctionDeclaration>) -> Self {
        self.tools = if declarations.is_empty() {
            Vec::new()
        } else {
            vec![Tool {
                function_declarations: declarations,
            }]
        };
        self
    }

    pub fn history(&self) -> &Conversation {
        &self.history
    }

    /// Append a user turn, ask the model, and append its reply.
    ///
    /// On failure the user turn is removed again so the history only holds
    /// exchanges that completed.
    pub fn send(&mut self, parts: Vec<Part>) -> Result<Content, GeminiError> {
        self.history.push(Content::user(parts));

        let request = GenerateContentRequest {
            contents: self.history.turns().to_vec(),
            tools: self.tools.clone(),
            generation_config: Some(self.generation_config.clone()),
        };

        let reply = match self.model.generate_content(&request) {
            Ok(resp) => resp,
            Err(e) => {
                self.history.pop();
                return Err(e);
            }
        };

        let candidate = reply.candidates.into_iter().next();
        let content = match candidate {
            Some(c) => match c.content {
                Some(content) => content,
                None => {
                    self.history.pop();
                    return Err(GeminiError::NoCandidates(
                        c.finish_reason.unwrap_or_else(|| "unknown".to_string()),
                    ));
                }
            },
            None => {
                self.history.pop();
                return Err(GeminiError::NoCandidates("none".to_string()));
            }
        };

        // Replies occasionally omit the role
        let content = Content {
            role: Role::Model,
            parts: content.parts,
        };
        self.history.push(content.clone());
        Ok(content)
    }
}
