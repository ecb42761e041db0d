//! Terminal prompts: yes/no questions, free text, and candidate selection.

use console::style;
use dialoguer::{Confirm, Input};
use techtree_core::{Candidate, Chooser};
use techtree_search::Corpus;
use techtree_shared::{Result, TechTreeError};

/// Ask a yes/no question.
pub(crate) fn confirm(message: &str) -> Result<bool> {
    Confirm::new()
        .with_prompt(message)
        .interact()
        .map_err(prompt_error)
}

/// Read one line of free text; empty input is allowed.
pub(crate) fn text(message: &str) -> Result<String> {
    Input::<String>::new()
        .with_prompt(message)
        .allow_empty(true)
        .interact_text()
        .map_err(prompt_error)
}

fn prompt_error(e: dialoguer::Error) -> TechTreeError {
    TechTreeError::io("<terminal>", std::io::Error::other(e.to_string()))
}

/// Prints numbered candidates and reads the selection from the terminal.
pub(crate) struct PromptChooser;

impl Chooser for PromptChooser {
    fn choose(&mut self, candidates: &[Candidate]) -> Result<usize> {
        let mut current = None;
        for candidate in candidates {
            if current != Some(candidate.corpus) {
                println!("Results for index \"{}\":", candidate.corpus);
                current = Some(candidate.corpus);
            }
            println!("  {}", candidate_line(candidate));
        }

        let max = candidates.len();
        Input::<usize>::new()
            .with_prompt("What index corresponds to your intention? (0 for none)")
            .validate_with(move |choice: &usize| -> std::result::Result<(), String> {
                if *choice <= max {
                    Ok(())
                } else {
                    Err(format!("pick a number between 0 and {max}"))
                }
            })
            .interact_text()
            .map_err(prompt_error)
    }

    fn no_match(&mut self, corpus: Corpus) {
        println!("No results for index \"{corpus}\".");
    }
}

/// `<number> <text>`, followed by the owning step's title for product hits.
pub(crate) fn candidate_line(candidate: &Candidate) -> String {
    let number = style(candidate.number).yellow();
    let text = style(&candidate.text).green();
    match (candidate.corpus, &candidate.producer_title) {
        (Corpus::Products, Some(title)) => {
            format!("{number} {text} {}", style(format!("({title})")).blue())
        }
        _ => format!("{number} {text}"),
    }
}
