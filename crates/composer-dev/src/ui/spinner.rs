use console::style;
use indicatif::{ProgressBar, ProgressStyle};
use std::time::Duration;

fn default_style() -> ProgressStyle {
    ProgressStyle::with_template("{spinner:.green} {msg}")
        .unwrap_or_else(|_| ProgressStyle::default_spinner())
        .tick_chars("⠋⠙⠹⠸⠼⠴⠦⠧⠇⠏ ")
}

fn finished_style() -> ProgressStyle {
    ProgressStyle::with_template("{msg}").unwrap_or_else(|_| ProgressStyle::default_spinner())
}

/// RAII spinner on stderr for a long-running step
///
/// Hidden when stderr is not a terminal; lines printed through it still reach
/// the user.
#[derive(Debug)]
pub struct PlainSpinner {
    pb: ProgressBar,
}

impl PlainSpinner {
    pub fn start(message: &str) -> Self {
        let pb = ProgressBar::new_spinner();
        pb.enable_steady_tick(Duration::from_millis(80));
        pb.set_style(default_style());
        pb.set_message(style(message).green().bold().to_string());
        Self { pb }
    }

    /// Printer that writes above the spinner, usable from other tasks
    pub fn line_printer(&self) -> impl Fn(&str) + Send + Sync + 'static {
        let pb = self.pb.clone();
        move |line: &str| print_above(&pb, line)
    }

    pub fn println(&self, line: &str) {
        print_above(&self.pb, line);
    }

    pub fn finish_with_message(self, message: &str) {
        self.pb.set_style(finished_style());
        self.pb
            .finish_with_message(style(message).green().to_string());
    }

    /// Clear the spinner without leaving a message behind
    pub fn finish_and_clear(self) {
        self.pb.finish_and_clear();
    }
}

impl Drop for PlainSpinner {
    fn drop(&mut self) {
        if !self.pb.is_finished() {
            self.pb.finish_and_clear();
        }
    }
}

fn print_above(pb: &ProgressBar, line: &str) {
    if pb.is_hidden() {
        println!("{}", line);
    } else {
        pb.println(line);
    }
}
