use std::collections::HashMap;

use serde_json::Value;

use crate::app::App;
use crate::logging::LogBuffer;

const DEFAULT_LOG_LINES: usize = 20;

/// Output from a command execution.
pub enum CommandOutput {
    /// Lines to display in the console.
    Lines(Vec<String>),
    /// Signal that the app should quit.
    Quit,
}

/// Context available to commands during execution.
pub struct CommandContext<'a> {
    pub app: &'a mut App,
    pub logs: &'a LogBuffer,
}

impl CommandContext<'_> {
    /// Let queued deliveries and pending activations finish so the command's
    /// effects are visible in its output.
    fn settle(&mut self) {
        self.app.run_until_idle();
    }
}

/// A console command.
pub trait Command {
    fn name(&self) -> &str;
    fn aliases(&self) -> &[&str] { &[] }
    fn description(&self) -> &str;
    fn usage(&self) -> &str { self.name() }
    fn execute(&self, args: &[&str], ctx: &mut CommandContext) -> CommandOutput;
}

/// Registry of console commands.
pub struct CommandRegistry {
    commands: Vec<Box<dyn Command>>,
    lookup: HashMap<String, usize>,
}

impl Default for CommandRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl CommandRegistry {
    pub fn new() -> Self {
        Self {
            commands: Vec::new(),
            lookup: HashMap::new(),
        }
    }

    pub fn register(&mut self, cmd: Box<dyn Command>) {
        let idx = self.commands.len();
        self.lookup.insert(cmd.name().to_string(), idx);
        for alias in cmd.aliases() {
            self.lookup.insert(alias.to_string(), idx);
        }
        self.commands.push(cmd);
    }

    pub fn execute(&self, input: &str, ctx: &mut CommandContext) -> CommandOutput {
        let parts: Vec<&str> = input.split_whitespace().collect();
        let Some((&name, args)) = parts.split_first() else {
            return CommandOutput::Lines(vec![]);
        };

        match self.lookup.get(name) {
            Some(&idx) if self.commands[idx].name() == "help" => {
                CommandOutput::Lines(self.help(args.first().copied()))
            }
            Some(&idx) => self.commands[idx].execute(args, ctx),
            None => CommandOutput::Lines(vec![
                format!("unknown command: '{}'. Type 'help' for available commands.", name),
            ]),
        }
    }

    /// Help text: every command, or the usage of one.
    pub fn help(&self, topic: Option<&str>) -> Vec<String> {
        match topic {
            Some(name) => match self.lookup.get(name) {
                Some(&idx) => {
                    let cmd = &self.commands[idx];
                    vec![format!("usage: {}", cmd.usage()), format!("  {}", cmd.description())]
                }
                None => vec![format!("no such command: '{}'", name)],
            },
            None => self
                .commands
                .iter()
                .map(|cmd| format!("  {:<32} {}", cmd.usage(), cmd.description()))
                .collect(),
        }
    }

    pub fn commands(&self) -> &[Box<dyn Command>] {
        &self.commands
    }
}

// ── Built-in commands ──

/// Listed for help; [`CommandRegistry::execute`] answers it directly since
/// it needs the registry itself.
pub struct HelpCommand;

impl Command for HelpCommand {
    fn name(&self) -> &str { "help" }
    fn aliases(&self) -> &[&str] { &["?"] }
    fn description(&self) -> &str { "List commands or show usage of one" }
    fn usage(&self) -> &str { "help [command]" }

    fn execute(&self, _args: &[&str], _ctx: &mut CommandContext) -> CommandOutput {
        CommandOutput::Lines(vec!["Type 'help' to list all commands.".into()])
    }
}

pub struct NavCommand;

impl Command for NavCommand {
    fn name(&self) -> &str { "nav" }
    fn aliases(&self) -> &[&str] { &["go"] }
    fn description(&self) -> &str { "Navigate to a path" }
    fn usage(&self) -> &str { "nav <path>" }

    fn execute(&self, args: &[&str], ctx: &mut CommandContext) -> CommandOutput {
        let Some(path) = args.first() else {
            return CommandOutput::Lines(vec![format!("usage: {}", self.usage())]);
        };
        if let Err(e) = ctx.app.navigate(path) {
            return CommandOutput::Lines(vec![format!("error: {}", e)]);
        }
        ctx.settle();
        CommandOutput::Lines(vec![format!("location: {}", ctx.app.route_state().location)])
    }
}

pub struct HashCommand;

impl Command for HashCommand {
    fn name(&self) -> &str { "hash" }
    fn description(&self) -> &str { "Set the raw location fragment" }
    fn usage(&self) -> &str { "hash <fragment>" }

    fn execute(&self, args: &[&str], ctx: &mut CommandContext) -> CommandOutput {
        let fragment = args.first().copied().unwrap_or("");
        if let Err(e) = ctx.app.hash_changed(fragment) {
            return CommandOutput::Lines(vec![format!("error: {}", e)]);
        }
        ctx.settle();
        let state = ctx.app.route_state();
        CommandOutput::Lines(vec![format!("path: '{}', query: {}", state.path, state.query.to_json())])
    }
}

pub struct FireCommand;

impl Command for FireCommand {
    fn name(&self) -> &str { "fire" }
    fn description(&self) -> &str { "Fire a delegated event on a mount point" }
    fn usage(&self) -> &str { "fire <mount> <event> [selector|-] [value]" }

    fn execute(&self, args: &[&str], ctx: &mut CommandContext) -> CommandOutput {
        let [mount, event_type, rest @ ..] = args else {
            return CommandOutput::Lines(vec![format!("usage: {}", self.usage())]);
        };
        let selector = match rest.first() {
            None | Some(&"-") => "",
            Some(s) => *s,
        };
        let value = (rest.len() > 1).then(|| rest[1..].join(" "));

        let handled = ctx.app.fire(mount, event_type, selector, value.as_deref());
        ctx.settle();
        CommandOutput::Lines(vec![format!("{} handler(s) ran", handled)])
    }
}

pub struct ShowCommand;

impl Command for ShowCommand {
    fn name(&self) -> &str { "show" }
    fn aliases(&self) -> &[&str] { &["cat"] }
    fn description(&self) -> &str { "Print mount point contents" }
    fn usage(&self) -> &str { "show [mount]" }

    fn execute(&self, args: &[&str], ctx: &mut CommandContext) -> CommandOutput {
        if let Some(mount) = args.first() {
            return match ctx.app.content(mount) {
                Some(content) if !content.is_empty() => {
                    CommandOutput::Lines(content.lines().map(str::to_string).collect())
                }
                Some(_) => CommandOutput::Lines(vec![format!("{} is empty", mount)]),
                None => CommandOutput::Lines(vec![format!("no mount point '{}'", mount)]),
            };
        }

        let mut lines = Vec::new();
        for id in ctx.app.module_ids() {
            match ctx.app.content(&id) {
                Some(content) if !content.is_empty() => {
                    lines.push(format!("[{}]", id));
                    lines.extend(content.lines().map(|l| format!("  {}", l)));
                }
                _ => lines.push(format!("[{}] (empty)", id)),
            }
        }
        CommandOutput::Lines(lines)
    }
}

pub struct PublishCommand;

impl Command for PublishCommand {
    fn name(&self) -> &str { "publish" }
    fn aliases(&self) -> &[&str] { &["pub"] }
    fn description(&self) -> &str { "Publish a JSON payload on a topic" }
    fn usage(&self) -> &str { "publish <topic> [json]" }

    fn execute(&self, args: &[&str], ctx: &mut CommandContext) -> CommandOutput {
        let Some((topic, rest)) = args.split_first() else {
            return CommandOutput::Lines(vec![format!("usage: {}", self.usage())]);
        };
        let payload = if rest.is_empty() {
            Value::Null
        } else {
            match serde_json::from_str(&rest.join(" ")) {
                Ok(v) => v,
                Err(e) => return CommandOutput::Lines(vec![format!("error: invalid JSON: {}", e)]),
            }
        };

        let listeners = ctx.app.bus().subscriber_count(topic);
        if !ctx.app.publish(topic, payload) {
            return CommandOutput::Lines(vec![format!("no subscribers for '{}'", topic)]);
        }
        ctx.settle();
        CommandOutput::Lines(vec![format!("delivered to {} subscriber(s)", listeners)])
    }
}

pub struct StoreCommand;

impl Command for StoreCommand {
    fn name(&self) -> &str { "store" }
    fn description(&self) -> &str { "Read, write or delete a persisted value" }
    fn usage(&self) -> &str { "store <key> [value|--delete]" }

    fn execute(&self, args: &[&str], ctx: &mut CommandContext) -> CommandOutput {
        let Some((key, rest)) = args.split_first() else {
            return CommandOutput::Lines(vec![format!("usage: {}", self.usage())]);
        };
        let mut store = ctx.app.store();
        let line = match rest {
            [] => match store.get(key) {
                Some(value) => format!("{} = {}", key, value),
                None => format!("{} is not set", key),
            },
            ["--delete"] => {
                store.remove(key);
                format!("{} deleted", key)
            }
            value => {
                let value = value.join(" ");
                store.set(key, &value);
                format!("{} = {}", key, value)
            }
        };
        CommandOutput::Lines(vec![line])
    }
}

pub struct RoutesCommand;

impl Command for RoutesCommand {
    fn name(&self) -> &str { "routes" }
    fn description(&self) -> &str { "List the route table" }

    fn execute(&self, _args: &[&str], ctx: &mut CommandContext) -> CommandOutput {
        let routes = ctx.app.routes();
        if routes.is_empty() {
            return CommandOutput::Lines(vec!["no routes".into()]);
        }
        let lines = routes
            .iter()
            .map(|(pattern, targets)| {
                let targets: Vec<String> = targets
                    .iter()
                    .map(|t| format!("{}.{}", t.module_id, t.handler))
                    .collect();
                format!("  {:<12} -> {}", pattern, targets.join(", "))
            })
            .collect();
        CommandOutput::Lines(lines)
    }
}

pub struct ModulesCommand;

impl Command for ModulesCommand {
    fn name(&self) -> &str { "modules" }
    fn aliases(&self) -> &[&str] { &["mods"] }
    fn description(&self) -> &str { "List registered modules" }

    fn execute(&self, _args: &[&str], ctx: &mut CommandContext) -> CommandOutput {
        let lines = ctx
            .app
            .module_ids()
            .into_iter()
            .map(|id| {
                let marker = if ctx.app.template(&id).is_some() { " (loaded)" } else { "" };
                format!("  {}{}", id, marker)
            })
            .collect();
        CommandOutput::Lines(lines)
    }
}

pub struct RouteCommand;

impl Command for RouteCommand {
    fn name(&self) -> &str { "route" }
    fn aliases(&self) -> &[&str] { &["where"] }
    fn description(&self) -> &str { "Show the current route" }

    fn execute(&self, _args: &[&str], ctx: &mut CommandContext) -> CommandOutput {
        let state = ctx.app.route_state();
        let secs = state.uptime().as_secs();
        CommandOutput::Lines(vec![
            format!("location: {}", state.location),
            format!("path: '{}'", state.path),
            format!("query: {}", state.query.to_json()),
            format!("passes: {}", state.passes),
            format!("uptime: {:02}:{:02}:{:02}", secs / 3600, (secs % 3600) / 60, secs % 60),
        ])
    }
}

pub struct LogsCommand;

impl Command for LogsCommand {
    fn name(&self) -> &str { "logs" }
    fn description(&self) -> &str { "Show recent log lines" }
    fn usage(&self) -> &str { "logs [count]" }

    fn execute(&self, args: &[&str], ctx: &mut CommandContext) -> CommandOutput {
        let count = match args.first().map(|a| a.parse::<usize>()) {
            None => DEFAULT_LOG_LINES,
            Some(Ok(n)) => n,
            Some(Err(_)) => return CommandOutput::Lines(vec![format!("usage: {}", self.usage())]),
        };
        let lines = ctx.logs.recent(count).iter().map(ToString::to_string).collect();
        CommandOutput::Lines(lines)
    }
}

pub struct QuitCommand;

impl Command for QuitCommand {
    fn name(&self) -> &str { "quit" }
    fn aliases(&self) -> &[&str] { &["exit", "q"] }
    fn description(&self) -> &str { "Exit skiff" }

    fn execute(&self, _args: &[&str], _ctx: &mut CommandContext) -> CommandOutput {
        CommandOutput::Quit
    }
}

/// Create a CommandRegistry pre-loaded with all built-in commands.
pub fn builtin_registry() -> CommandRegistry {
    let mut reg = CommandRegistry::new();
    reg.register(Box::new(HelpCommand));
    reg.register(Box::new(NavCommand));
    reg.register(Box::new(HashCommand));
    reg.register(Box::new(FireCommand));
    reg.register(Box::new(ShowCommand));
    reg.register(Box::new(PublishCommand));
    reg.register(Box::new(StoreCommand));
    reg.register(Box::new(RoutesCommand));
    reg.register(Box::new(ModulesCommand));
    reg.register(Box::new(RouteCommand));
    reg.register(Box::new(LogsCommand));
    reg.register(Box::new(QuitCommand));
    reg
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::Context;
    use crate::error::SkiffError;
    use crate::loader::MemoryTemplates;
    use crate::logging::{LogEntry, LogLevel};
    use crate::module::{HandlerInput, Module};
    use serde_json::json;
    use std::rc::Rc;

    struct FakeModule {
        routes: &'static [(&'static str, &'static str)],
        events: &'static [(&'static str, &'static str)],
        listening: bool,
    }

    impl Module for FakeModule {
        fn routes(&self) -> &[(&str, &str)] { self.routes }
        fn events(&self) -> &[(&str, &str)] { self.events }
        fn template(&self) -> Option<&str> { Some("<p>{{name}}</p>") }

        fn handle(&mut self, handler: &str, ctx: &mut Context<'_>, input: HandlerInput) -> Result<(), SkiffError> {
            match (handler, input) {
                ("show", HandlerInput::Route(query)) => ctx.render(&query.to_json()),
                ("greet", HandlerInput::Message(payload)) => ctx.render(&payload),
                ("typed", HandlerInput::Event(event)) => {
                    ctx.render(&json!({ "name": event.value.unwrap_or_default() }))
                }
                ("listen", _) => {
                    if !self.listening {
                        ctx.subscribe("greet", "greet");
                        self.listening = true;
                    }
                    Ok(())
                }
                (other, _) => Err(ctx.unknown(other)),
            }
        }
    }

    fn make_app() -> App {
        let mut app = App::builder()
            .templates(Rc::new(MemoryTemplates::new()))
            .build();
        app.register(
            "mods/hello",
            Box::new(FakeModule {
                routes: &[("home", "show"), ("*", "listen")],
                events: &[("input .name", "typed")],
                listening: false,
            }),
        )
        .unwrap();
        app.start("#!/home?name=ada").unwrap();
        app.run_until_idle();
        app
    }

    fn lines(output: CommandOutput) -> Vec<String> {
        match output {
            CommandOutput::Lines(lines) => lines,
            CommandOutput::Quit => panic!("expected Lines"),
        }
    }

    #[test]
    fn unknown_command() {
        let mut app = make_app();
        let logs = LogBuffer::new(8);
        let mut ctx = CommandContext { app: &mut app, logs: &logs };
        let reg = builtin_registry();
        let out = lines(reg.execute("foobar", &mut ctx));
        assert!(out[0].contains("unknown command"));
    }

    #[test]
    fn empty_input() {
        let mut app = make_app();
        let logs = LogBuffer::new(8);
        let mut ctx = CommandContext { app: &mut app, logs: &logs };
        assert!(lines(builtin_registry().execute("   ", &mut ctx)).is_empty());
    }

    #[test]
    fn help_lists_every_command() {
        let mut app = make_app();
        let logs = LogBuffer::new(8);
        let mut ctx = CommandContext { app: &mut app, logs: &logs };
        let reg = builtin_registry();
        let out = lines(reg.execute("help", &mut ctx));
        assert_eq!(out.len(), reg.commands().len());
        assert!(out.iter().any(|l| l.contains("nav <path>")));

        let one = lines(reg.execute("? fire", &mut ctx));
        assert_eq!(one[0], "usage: fire <mount> <event> [selector|-] [value]");
    }

    #[test]
    fn nav_routes_and_show_prints_content() {
        let mut app = make_app();
        let logs = LogBuffer::new(8);
        let mut ctx = CommandContext { app: &mut app, logs: &logs };
        let reg = builtin_registry();

        let out = lines(reg.execute("nav home", &mut ctx));
        assert_eq!(out, vec!["location: #!/home"]);
        let shown = lines(reg.execute("show hello", &mut ctx));
        assert_eq!(shown, vec!["<p></p>"]);
    }

    #[test]
    fn hash_reports_parsed_query() {
        let mut app = make_app();
        let logs = LogBuffer::new(8);
        let mut ctx = CommandContext { app: &mut app, logs: &logs };
        let out = lines(builtin_registry().execute("hash #!/home?name=bob", &mut ctx));
        assert_eq!(out, vec![r#"path: 'home', query: {"name":"bob"}"#]);
        assert_eq!(ctx.app.content("hello").as_deref(), Some("<p>bob</p>"));
    }

    #[test]
    fn fire_passes_value_to_handler() {
        let mut app = make_app();
        let logs = LogBuffer::new(8);
        let mut ctx = CommandContext { app: &mut app, logs: &logs };
        let out = lines(builtin_registry().execute("fire hello input .name grace hopper", &mut ctx));
        assert_eq!(out, vec!["1 handler(s) ran"]);
        assert_eq!(ctx.app.content("hello").as_deref(), Some("<p>grace hopper</p>"));
    }

    #[test]
    fn fire_without_match_runs_nothing() {
        let mut app = make_app();
        let logs = LogBuffer::new(8);
        let mut ctx = CommandContext { app: &mut app, logs: &logs };
        let out = lines(builtin_registry().execute("fire hello click -", &mut ctx));
        assert_eq!(out, vec!["0 handler(s) ran"]);
    }

    #[test]
    fn publish_delivers_json() {
        let mut app = make_app();
        let logs = LogBuffer::new(8);
        let mut ctx = CommandContext { app: &mut app, logs: &logs };
        let reg = builtin_registry();

        let out = lines(reg.execute(r#"publish greet {"name": "linus"}"#, &mut ctx));
        assert_eq!(out, vec!["delivered to 1 subscriber(s)"]);
        assert_eq!(ctx.app.content("hello").as_deref(), Some("<p>linus</p>"));

        let bad = lines(reg.execute("publish greet {oops", &mut ctx));
        assert!(bad[0].starts_with("error: invalid JSON"));
        let none = lines(reg.execute("publish nobody", &mut ctx));
        assert_eq!(none, vec!["no subscribers for 'nobody'"]);
    }

    #[test]
    fn store_get_set_delete() {
        let mut app = make_app();
        let logs = LogBuffer::new(8);
        let mut ctx = CommandContext { app: &mut app, logs: &logs };
        let reg = builtin_registry();

        assert_eq!(lines(reg.execute("store theme", &mut ctx)), vec!["theme is not set"]);
        assert_eq!(lines(reg.execute("store theme dark mode", &mut ctx)), vec!["theme = dark mode"]);
        assert_eq!(lines(reg.execute("store theme", &mut ctx)), vec!["theme = dark mode"]);
        assert_eq!(lines(reg.execute("store theme --delete", &mut ctx)), vec!["theme deleted"]);
        assert_eq!(lines(reg.execute("store theme", &mut ctx)), vec!["theme is not set"]);
    }

    #[test]
    fn routes_and_modules_listing() {
        let mut app = make_app();
        let logs = LogBuffer::new(8);
        let mut ctx = CommandContext { app: &mut app, logs: &logs };
        let reg = builtin_registry();

        let routes = lines(reg.execute("routes", &mut ctx));
        assert_eq!(routes.len(), 2);
        assert!(routes[0].contains("home") && routes[0].contains("hello.show"));
        assert!(routes[1].contains("hello.listen"));

        let modules = lines(reg.execute("mods", &mut ctx));
        assert_eq!(modules, vec!["  hello (loaded)"]);
    }

    #[test]
    fn route_shows_current_location() {
        let mut app = make_app();
        let logs = LogBuffer::new(8);
        let mut ctx = CommandContext { app: &mut app, logs: &logs };
        let out = lines(builtin_registry().execute("where", &mut ctx));
        assert_eq!(out[0], "location: #!/home?name=ada");
        assert_eq!(out[1], "path: 'home'");
        assert_eq!(out[3], "passes: 1");
    }

    #[test]
    fn logs_shows_recent_entries() {
        let mut app = make_app();
        let logs = LogBuffer::new(8);
        for i in 0..3 {
            logs.push(LogEntry {
                level: LogLevel::Info,
                target: "skiff".into(),
                message: format!("line {i}"),
            });
        }
        let mut ctx = CommandContext { app: &mut app, logs: &logs };
        let reg = builtin_registry();
        let out = lines(reg.execute("logs 2", &mut ctx));
        assert_eq!(out.len(), 2);
        assert!(out[1].ends_with("line 2"));
        assert!(lines(reg.execute("logs many", &mut ctx))[0].starts_with("usage"));
    }

    #[test]
    fn quit_and_aliases() {
        let mut app = make_app();
        let logs = LogBuffer::new(8);
        let mut ctx = CommandContext { app: &mut app, logs: &logs };
        let reg = builtin_registry();
        for input in ["quit", "exit", "q"] {
            assert!(matches!(reg.execute(input, &mut ctx), CommandOutput::Quit));
        }
    }

    #[test]
    fn missing_arguments_print_usage() {
        let mut app = make_app();
        let logs = LogBuffer::new(8);
        let mut ctx = CommandContext { app: &mut app, logs: &logs };
        let reg = builtin_registry();
        assert_eq!(lines(reg.execute("nav", &mut ctx)), vec!["usage: nav <path>"]);
        assert!(lines(reg.execute("fire hello", &mut ctx))[0].starts_with("usage"));
        assert!(lines(reg.execute("store", &mut ctx))[0].starts_with("usage"));
    }
}
