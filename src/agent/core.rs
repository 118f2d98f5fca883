//! Core orchestration loop.
//!
//! Lists the server's tools, offers them to the model as function
//! declarations, and resolves the function calls the model issues through
//! the MCP client until the model answers in plain text.

use crate::gemini::{ChatModel, ChatSession, Content, FunctionCall, FunctionDeclaration, Part};
use crate::mcp::{McpClient, MessageChannel, ToolDescriptor, ToolOutcome};
use crate::tools::mcp_dispatch;
use anyhow::{Context, Result};

/// Default cap on function-call rounds in loop mode
pub const DEFAULT_MAX_ITERATIONS: usize = 5;

/// How many function-call rounds a run may take
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum Mode {
    /// Resolve the call in the first part of the first reply, if any
    Single,
    /// Keep resolving calls until the model stops or the cap is hit
    #[default]
    Loop,
}

/// Configuration for the agent loop
#[derive(Debug, Clone)]
pub struct AgentLoopConfig {
    pub mode: Mode,
    /// Maximum function-call rounds before stopping
    pub max_iterations: usize,
    pub temperature: f32,
}

impl Default for AgentLoopConfig {
    fn default() -> Self {
        Self {
            mode: Mode::default(),
            max_iterations: DEFAULT_MAX_ITERATIONS,
            temperature: 0.0,
        }
    }
}

impl AgentLoopConfig {
    pub fn with_mode(mut self, mode: Mode) -> Self {
        self.mode = mode;
        self
    }

    pub fn with_max_iterations(mut self, n: usize) -> Self {
        self.max_iterations = n;
        self
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }
}

/// Hooks for observing a run.
pub trait AgentHooks {
    fn on_tool_call(&self, call: &FunctionCall) {
        tracing::info!(tool = %call.name, args = %call.args.to_json(), "model requested tool");
    }

    fn on_tool_result(&self, name: &str, outcome: &ToolOutcome) {
        match outcome {
            ToolOutcome::Success(text) => tracing::info!(tool = name, result = %text, "tool result"),
            ToolOutcome::Failure(message) => tracing::warn!(tool = name, error = %message, "tool failed"),
        }
    }

    /// Called once with the reply that ends the run.
    ///
    /// Default implementation prints each text part, then a `---` separator.
    fn on_answer(&self, reply: &Content) {
        for part in reply.parts.iter().filter(|p| p.text.is_some()) {
            println!("{}", part);
        }
        println!("---");
    }
}

/// Hooks that log tool traffic and print the answer to stdout
pub struct ConsoleHooks;

impl AgentHooks for ConsoleHooks {}

/// Summary of a finished run
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RunReport {
    /// Function-call rounds resolved
    pub iterations: usize,
    /// Individual tool invocations
    pub tool_calls: usize,
    /// Text of the final reply
    pub answer: String,
    /// The run stopped because of the iteration cap
    pub hit_iteration_cap: bool,
}

/// Translate tool descriptors into function declarations. A tool whose
/// schema cannot be translated is logged and left out.
pub fn declare_tools(tools: &[ToolDescriptor]) -> Vec<FunctionDeclaration> {
    tools
        .iter()
        .filter_map(|tool| match tool.to_function_declaration() {
            Ok(decl) => Some(decl),
            Err(e) => {
                tracing::error!(tool = %tool.name, error = %e, "skipping tool with untranslatable schema");
                None
            }
        })
        .collect()
}

/// Run one prompt against the model with the server's tools available.
///
/// `client` must already be initialized.
pub fn run<M, C, H>(
    model: &M,
    client: &mut McpClient<C>,
    hooks: &H,
    config: &AgentLoopConfig,
    prompt: &str,
) -> Result<RunReport>
where
    M: ChatModel + ?Sized,
    C: MessageChannel,
    H: AgentHooks + ?Sized,
{
    let tools = client.list_tools().context("failed to list tools")?;
    tracing::info!(count = tools.len(), "listed tools");
    let declarations = declare_tools(&tools);

    let mut session = ChatSession::new(model, config.temperature).with_functions(declarations);
    tracing::info!(model = model.model_name(), %prompt, "sending prompt");
    let reply = session
        .send(vec![Part::text(prompt)])
        .context("failed to send prompt to model")?;

    let (reply, mut report) = match config.mode {
        Mode::Single => run_single(&mut session, client, hooks, reply)?,
        Mode::Loop => run_loop(&mut session, client, hooks, config.max_iterations, reply)?,
    };

    hooks.on_answer(&reply);
    report.answer = reply.text();
    Ok(report)
}

fn run_single<M, C, H>(
    session: &mut ChatSession<'_, M>,
    client: &mut McpClient<C>,
    hooks: &H,
    reply: Content,
) -> Result<(Content, RunReport)>
where
    M: ChatModel + ?Sized,
    C: MessageChannel,
    H: AgentHooks + ?Sized,
{
    let mut report = RunReport::default();
    let call = reply.parts.first().and_then(|p| p.function_call.clone());
    let Some(call) = call else {
        tracing::info!("model answered without calling a tool");
        return Ok((reply, report));
    };

    let response = invoke(client, hooks, &call);
    report.iterations = 1;
    report.tool_calls = 1;
    let reply = session
        .send(vec![response])
        .context("failed to send function response to model")?;
    Ok((reply, report))
}

fn run_loop<M, C, H>(
    session: &mut ChatSession<'_, M>,
    client: &mut McpClient<C>,
    hooks: &H,
    max_iterations: usize,
    mut reply: Content,
) -> Result<(Content, RunReport)>
where
    M: ChatModel + ?Sized,
    C: MessageChannel,
    H: AgentHooks + ?Sized,
{
    let mut report = RunReport::default();

    loop {
        let calls = reply.function_calls();
        if calls.is_empty() {
            break;
        }
        if report.iterations == max_iterations {
            tracing::warn!(max_iterations, "iteration cap reached, stopping");
            report.hit_iteration_cap = true;
            break;
        }
        report.iterations += 1;
        tracing::debug!(iteration = report.iterations, calls = calls.len(), "resolving function calls");

        // every response of one reply goes back in a single user turn
        let responses: Vec<Part> = calls.into_iter().map(|call| invoke(client, hooks, call)).collect();
        report.tool_calls += responses.len();

        reply = session
            .send(responses)
            .context("failed to send function responses to model")?;
    }

    Ok((reply, report))
}

/// Invoke one call and wrap the outcome as a function-response part
fn invoke<C, H>(client: &mut McpClient<C>, hooks: &H, call: &FunctionCall) -> Part
where
    C: MessageChannel,
    H: AgentHooks + ?Sized,
{
    hooks.on_tool_call(call);
    let outcome = mcp_dispatch::execute(client, &call.name, &call.args);
    hooks.on_tool_result(&call.name, &outcome);
    Part::function_response(call.name.clone(), outcome.to_function_response())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gemini::{Candidate, GeminiError, GenerateContentRequest, GenerateContentResponse, Role};
    use crate::mcp::testing::{self, LoopbackChannel};
    use crate::mcp::McpClient;
    use crate::tools::Catalog;
    use crate::value::Arguments;
    use serde_json::json;
    use std::cell::RefCell;

    type Script = Box<dyn Fn(usize, &GenerateContentRequest) -> Content>;

    /// Replies according to a script and records every request.
    struct ScriptedModel {
        script: Script,
        requests: RefCell<Vec<GenerateContentRequest>>,
    }

    impl ScriptedModel {
        fn new(script: impl Fn(usize, &GenerateContentRequest) -> Content + 'static) -> Self {
            Self {
                script: Box::new(script),
                requests: RefCell::new(Vec::new()),
            }
        }

        fn calls(&self) -> usize {
            self.requests.borrow().len()
        }
    }

    impl ChatModel for ScriptedModel {
        fn model_name(&self) -> &str {
            "scripted"
        }

        fn generate_content(
            &self,
            request: &GenerateContentRequest,
        ) -> Result<GenerateContentResponse, GeminiError> {
            let n = self.calls();
            self.requests.borrow_mut().push(request.clone());
            Ok(GenerateContentResponse {
                candidates: vec![Candidate {
                    content: Some((self.script)(n, request)),
                    finish_reason: Some("STOP".to_string()),
                }],
                usage_metadata: None,
            })
        }
    }

    /// Silent hooks that remember what the run reported
    #[derive(Default)]
    struct RecordingHooks {
        outcomes: RefCell<Vec<ToolOutcome>>,
        answers: RefCell<Vec<String>>,
    }

    impl AgentHooks for RecordingHooks {
        fn on_tool_result(&self, _name: &str, outcome: &ToolOutcome) {
            self.outcomes.borrow_mut().push(outcome.clone());
        }

        fn on_answer(&self, reply: &Content) {
            self.answers.borrow_mut().push(reply.text());
        }
    }

    fn call(name: &str, args: Arguments) -> Part {
        Part::function_call(FunctionCall {
            name: name.to_string(),
            args,
        })
    }

    fn hello_world() -> Part {
        call("hello", Arguments::new().with("name", "World!"))
    }

    fn connected(catalog: Catalog) -> McpClient<LoopbackChannel> {
        let mut client = testing::client(catalog);
        client.initialize("agent-test").unwrap();
        client
    }

    #[test]
    fn test_agent_loop_config_builder() {
        let config = AgentLoopConfig::default();
        assert_eq!(config.max_iterations, DEFAULT_MAX_ITERATIONS);
        assert_eq!(config.mode, Mode::Loop);

        let config = AgentLoopConfig::default()
            .with_mode(Mode::Single)
            .with_max_iterations(2)
            .with_temperature(0.1);
        assert_eq!(config.mode, Mode::Single);
        assert_eq!(config.max_iterations, 2);
        assert_eq!(config.temperature, 0.1);
    }

    #[test]
    fn test_hello_round_trip() {
        let model = ScriptedModel::new(|n, _| match n {
            0 => Content::model(vec![hello_world()]),
            _ => Content::model(vec![Part::text("The tool said Hello World!")]),
        });
        let mut client = connected(Catalog::Greeter);
        let hooks = RecordingHooks::default();

        let report = run(&model, &mut client, &hooks, &AgentLoopConfig::default(), "Say hi").unwrap();

        assert_eq!(report.iterations, 1);
        assert_eq!(report.tool_calls, 1);
        assert_eq!(report.answer, "The tool said Hello World!");
        assert!(!report.hit_iteration_cap);
        assert_eq!(
            *hooks.outcomes.borrow(),
            vec![ToolOutcome::Success("Hello World!".to_string())]
        );

        let requests = model.requests.borrow();
        let decls = &requests[0].tools[0].function_declarations;
        assert_eq!(decls.len(), 1);
        assert_eq!(decls[0].name, "hello");
        assert_eq!(requests[0].generation_config.as_ref().unwrap().temperature, Some(0.0));

        // prompt, model call, function response
        let turns = &requests[1].contents;
        assert_eq!(turns.len(), 3);
        assert_eq!(turns[2].role, Role::User);
        let response = turns[2].parts[0].function_response.as_ref().unwrap();
        assert_eq!(response.name, "hello");
        assert_eq!(response.response, json!({"response": "Hello World!"}));
    }

    #[test]
    fn test_loop_stops_after_cap() {
        let model = ScriptedModel::new(|_, _| Content::model(vec![hello_world()]));
        let mut client = connected(Catalog::Greeter);
        let hooks = RecordingHooks::default();

        let report = run(&model, &mut client, &hooks, &AgentLoopConfig::default(), "loop").unwrap();

        assert_eq!(report.iterations, 5);
        assert_eq!(report.tool_calls, 5);
        assert!(report.hit_iteration_cap);
        assert_eq!(model.calls(), 6);
        assert_eq!(hooks.answers.borrow().len(), 1);
    }

    #[test]
    fn test_zero_calls_ends_immediately() {
        let model = ScriptedModel::new(|_, _| Content::model(vec![Part::text("No tools needed.")]));
        let mut client = connected(Catalog::Greeter);
        let hooks = RecordingHooks::default();

        let report = run(&model, &mut client, &hooks, &AgentLoopConfig::default(), "hi").unwrap();

        assert_eq!(report.iterations, 0);
        assert_eq!(report.answer, "No tools needed.");
        assert_eq!(model.calls(), 1);
    }

    #[test]
    fn test_all_calls_answered_in_one_turn() {
        let model = ScriptedModel::new(|n, _| match n {
            0 => Content::model(vec![
                Part::text("Checking."),
                hello_world(),
                call("bitcoin_price", Arguments::new().with("currency", "XYZ")),
            ]),
            _ => Content::model(vec![Part::text("done")]),
        });
        let mut client = connected(Catalog::Full);
        let hooks = RecordingHooks::default();

        let report = run(&model, &mut client, &hooks, &AgentLoopConfig::default(), "both").unwrap();
        assert_eq!(report.iterations, 1);
        assert_eq!(report.tool_calls, 2);

        let requests = model.requests.borrow();
        let turn = requests[1].contents.last().unwrap();
        assert_eq!(turn.parts.len(), 2);
        assert_eq!(
            turn.parts[1].function_response.as_ref().unwrap().response,
            json!({"error": "Error fetching Bitcoin price: unsupported currency: XYZ"})
        );
    }

    #[test]
    fn test_single_mode_resolves_one_call() {
        let model = ScriptedModel::new(|_, _| Content::model(vec![hello_world()]));
        let mut client = connected(Catalog::Greeter);
        let hooks = RecordingHooks::default();
        let config = AgentLoopConfig::default().with_mode(Mode::Single);

        let report = run(&model, &mut client, &hooks, &config, "once").unwrap();

        assert_eq!(report.tool_calls, 1);
        assert_eq!(model.calls(), 2);
        assert!(!report.hit_iteration_cap);
    }

    #[test]
    fn test_single_mode_only_checks_first_part() {
        let model = ScriptedModel::new(|_, _| {
            Content::model(vec![Part::text("Let me see."), hello_world()])
        });
        let mut client = connected(Catalog::Greeter);
        let hooks = RecordingHooks::default();
        let config = AgentLoopConfig::default().with_mode(Mode::Single);

        let report = run(&model, &mut client, &hooks, &config, "once").unwrap();

        assert_eq!(report.tool_calls, 0);
        assert_eq!(report.answer, "Let me see.");
        assert_eq!(model.calls(), 1);
    }

    #[test]
    fn test_declare_tools_skips_bad_schema() {
        let tools = vec![
            ToolDescriptor {
                name: "broken".to_string(),
                description: "declares a null property".to_string(),
                input_schema: json!({"type": "object", "properties": {"x": {"type": "null"}}}),
            },
            ToolDescriptor {
                name: "fine".to_string(),
                description: String::new(),
                input_schema: json!({"type": "object", "properties": {"x": {"type": "integer"}}}),
            },
        ];

        let decls = declare_tools(&tools);
        assert_eq!(decls.len(), 1);
        assert_eq!(decls[0].name, "fine");
    }
}
