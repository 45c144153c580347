//! Live console display
//!
//! Clears the terminal and redraws the latest recognized frame each time one
//! arrives.

use anyhow::Result;
use bms_log_decoder::{DisplaySink, FrameRecord};
use std::io::{self, Stdout, Write};

const CLEAR_SCREEN: &str = "\x1B[2J\x1B[1;1H";

pub struct ConsoleDisplay<W: Write = Stdout> {
    out: W,
    clear: bool,
}

impl ConsoleDisplay<Stdout> {
    pub fn stdout() -> Self {
        Self::new(io::stdout(), true)
    }
}

impl<W: Write> ConsoleDisplay<W> {
    pub fn new(out: W, clear: bool) -> Self {
        Self { out, clear }
    }

    pub fn into_inner(self) -> W {
        self.out
    }
}

impl<W: Write> DisplaySink for ConsoleDisplay<W> {
    fn show(&mut self, record: &FrameRecord) -> Result<()> {
        if self.clear {
            write!(self.out, "{}", CLEAR_SCREEN)?;
        }
        writeln!(self.out, "BMS Monitor (Ctrl+C to stop and generate plots)")?;
        writeln!(self.out)?;
        write!(self.out, "{}", record)?;
        self.out.flush()?;
        Ok(())
    }
}
