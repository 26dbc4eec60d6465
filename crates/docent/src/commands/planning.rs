//! Interactive plan-approval conversation.
//!
//! Reads user turns with rustyline and feeds them to the [`Planner`] until it
//! reports approval. Nothing is researched here.

use anyhow::Result;
use console::{Style, Term, style};
use docent_research::{PlanError, Planner, PlannerReply, ResearchError, ResearchPlan};
use rustyline::error::ReadlineError;
use rustyline::history::DefaultHistory;
use rustyline::{Config, Editor};

/// Planning conversation state.
pub struct PlanningSession {
    planner: Planner,
    editor: Editor<(), DefaultHistory>,
    term: Term,
    site: String,
}

/// Control flow for the conversation loop.
pub enum ControlFlow {
    Continue,
    Exit,
}

impl PlanningSession {
    pub fn new(planner: Planner, site: impl Into<String>) -> Result<Self> {
        let config = Config::builder()
            .history_ignore_space(true)
            .auto_add_history(true)
            .build();

        let editor = Editor::with_config(config)?;

        Ok(Self {
            planner,
            editor,
            term: Term::stdout(),
            site: site.into(),
        })
    }

    /// Converse until the plan is approved.
    ///
    /// Returns `None` when the user leaves without approving. With
    /// `auto_approve`, the first draft is accepted as is.
    pub async fn run(
        &mut self,
        question: Option<String>,
        auto_approve: bool,
    ) -> Result<Option<ResearchPlan>> {
        self.print_welcome();

        let mut pending = question;
        loop {
            let turn = match pending.take() {
                Some(turn) => turn,
                None => match self.read_turn()? {
                    Some(turn) => turn,
                    None => break,
                },
            };

            if turn.starts_with('/') {
                match self.handle_slash_command(&turn) {
                    ControlFlow::Continue => continue,
                    ControlFlow::Exit => break,
                }
            }

            match self.planner.handle(&turn).await {
                Ok(PlannerReply::Draft { plan, message }) => {
                    println!();
                    println!("{}", message.trim());
                    println!();
                    if auto_approve {
                        self.print_dim("Plan auto-approved (--yes)");
                        return Ok(Some(plan));
                    }
                    self.print_dim("Reply with changes, or approve (e.g. \"looks good\") to start.");
                }
                Ok(PlannerReply::Approved(plan)) => {
                    let green = Style::new().green();
                    println!(
                        "{} Plan approved: {} goals",
                        green.apply_to("✓"),
                        plan.len()
                    );
                    return Ok(Some(plan));
                }
                Err(ResearchError::Plan(PlanError::Empty)) => {
                    self.print_error("The planner reply had no goals. Try rephrasing.");
                }
                Err(e) => return Err(e.into()),
            }
        }

        self.print_dim("No plan approved; nothing was researched.");
        Ok(None)
    }

    /// Read one non-empty line. `None` on Ctrl+D.
    fn read_turn(&mut self) -> Result<Option<String>> {
        let prompt = self.format_prompt();
        loop {
            match self.editor.readline(&prompt) {
                Ok(line) => {
                    let line = line.trim();
                    if !line.is_empty() {
                        return Ok(Some(line.to_string()));
                    }
                }
                Err(ReadlineError::Interrupted) => {
                    println!();
                    self.print_dim("(Interrupted - type /quit to exit)");
                }
                Err(ReadlineError::Eof) => {
                    println!();
                    return Ok(None);
                }
                Err(e) => return Err(e.into()),
            }
        }
    }

    fn handle_slash_command(&mut self, input: &str) -> ControlFlow {
        let cmd = input[1..].split_whitespace().next().unwrap_or("");

        match cmd {
            "quit" | "q" | "exit" => return ControlFlow::Exit,
            "help" | "h" | "?" => self.print_help(),
            "plan" => match self.planner.plan() {
                Some(plan) => println!("{}", plan.render()),
                None => self.print_dim("No plan drafted yet"),
            },
            "clear" | "cls" => {
                if let Err(e) = self.term.clear_screen() {
                    self.print_error(&e.to_string());
                }
            }
            _ => {
                self.print_error(&format!("Unknown command: /{}", cmd));
                self.print_dim("Type /help for available commands");
            }
        }
        ControlFlow::Continue
    }

    fn print_welcome(&self) {
        let dim = Style::new().dim();
        println!();
        println!("{}", style("Docent Research Planner").bold().cyan());
        println!("{}", dim.apply_to("─".repeat(40)));
        println!("{}", dim.apply_to(format!("Site: {}", self.site)));
        println!(
            "{}",
            dim.apply_to("Ask a question; refine the plan until you approve it.")
        );
        println!(
            "{}",
            dim.apply_to("Use /help for commands, Ctrl+D to exit.")
        );
        println!();
    }

    fn print_help(&self) {
        let dim = Style::new().dim();
        println!();
        println!("{}", style("Available Commands").bold());
        println!("{}", dim.apply_to("─".repeat(40)));
        println!("  {}  - Exit without researching", style("/quit, /q").cyan());
        println!("  {}  - Show this help", style("/help, /h, /?").cyan());
        println!("  {}  - Show the current plan", style("/plan").cyan());
        println!("  {}  - Clear the screen", style("/clear").cyan());
        println!();
    }

    fn format_prompt(&self) -> String {
        format!("{} ", style("docent>").cyan().bold())
    }

    fn print_dim(&self, msg: &str) {
        let dim = Style::new().dim();
        println!("{}", dim.apply_to(msg));
    }

    fn print_error(&self, msg: &str) {
        let red = Style::new().red();
        println!("{} {}", red.apply_to("Error:"), msg);
    }
}
