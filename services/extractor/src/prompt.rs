//! Terminal prompts for region lookups that miss or match more than once.

use std::io::{self, BufRead, BufReader, Stdin, Stdout, Write};
use std::sync::Mutex;

use tracing::warn;

use extraction::{Ambiguity, ResolutionPolicy};

/// Asks the operator to settle ambiguous or missing lookups.
///
/// A blank answer (or end of input) declines, which fails the lookup.
pub struct InteractivePolicy<R, W> {
    io: Mutex<(R, W)>,
}

impl InteractivePolicy<BufReader<Stdin>, Stdout> {
    pub fn stdio() -> Self {
        Self::new(BufReader::new(io::stdin()), io::stdout())
    }
}

impl<R: BufRead, W: Write> InteractivePolicy<R, W> {
    pub fn new(input: R, output: W) -> Self {
        Self {
            io: Mutex::new((input, output)),
        }
    }

    /// Print `question` and read one trimmed line. `None` on a blank answer.
    fn ask(&self, question: &str) -> Option<String> {
        let mut guard = match self.io.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        let (input, output) = &mut *guard;

        let written = write!(output, "{} ", question).and_then(|_| output.flush());
        if let Err(e) = written {
            warn!(error = %e, "Failed to write prompt");
            return None;
        }

        let mut line = String::new();
        match input.read_line(&mut line) {
            Ok(0) => None,
            Ok(_) => {
                let answer = line.trim();
                (!answer.is_empty()).then(|| answer.to_string())
            }
            Err(e) => {
                warn!(error = %e, "Failed to read answer");
                None
            }
        }
    }

    /// Let the operator pick one of `candidates` by its 1-based number.
    fn choose<T: Clone + std::fmt::Display>(&self, header: &str, candidates: &[T]) -> Option<T> {
        let listing: Vec<String> = candidates
            .iter()
            .enumerate()
            .map(|(i, c)| format!("  [{}] {}", i + 1, c))
            .collect();
        let question = format!("{}\n{}\nSelect a number:", header, listing.join("\n"));
        let answer = self.ask(&question)?;
        match answer.parse::<usize>() {
            Ok(n) if (1..=candidates.len()).contains(&n) => Some(candidates[n - 1].clone()),
            _ => {
                warn!(answer = %answer, "Invalid selection");
                None
            }
        }
    }
}

impl<R, W> ResolutionPolicy for InteractivePolicy<R, W>
where
    R: BufRead + Send,
    W: Write + Send,
{
    fn resolve_id(&self, name: &str, ambiguity: Ambiguity<'_, u32>) -> Option<u32> {
        match ambiguity {
            Ambiguity::Missing => {
                let answer =
                    self.ask(&format!("No region named '{}'. Enter its id (blank to skip):", name))?;
                match answer.parse() {
                    Ok(id) => Some(id),
                    Err(_) => {
                        warn!(answer = %answer, "Not a region id");
                        None
                    }
                }
            }
            Ambiguity::Multiple(ids) => {
                self.choose(&format!("Several regions are named '{}':", name), ids)
            }
        }
    }

    fn resolve_name(&self, id: u32, ambiguity: Ambiguity<'_, String>) -> Option<String> {
        match ambiguity {
            Ambiguity::Missing => {
                self.ask(&format!("No name for region {}. Enter its name (blank to skip):", id))
            }
            Ambiguity::Multiple(names) => {
                self.choose(&format!("Region {} has several names:", id), names)
            }
        }
    }
}
