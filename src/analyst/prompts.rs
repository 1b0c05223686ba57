use super::executors::ScriptOutput;
use super::metadata::AttachmentSummary;
use super::repair::AttemptFailure;
use crate::shared::config::ExecutionConfig;

/// Fixed operating constraints sent as the system message on every call.
pub fn system_prompt(config: &ExecutionConfig) -> String {
    let budget_secs = config.script_timeout_secs;
    format!(
        "You write exactly one Python script and nothing else: no explanation, no prose. \
         The script is saved as {script} and run in a working directory that contains the uploaded files \
         (questions.txt and any attachments).\n\
         Rules:\n\
         - Use only these libraries: {libraries}.\n\
         - Print the final answer to STDOUT as a single valid JSON value (an array or an object). Print nothing else to STDOUT.\n\
         - Finish within {budget_secs} seconds.\n\
         - Do not write files outside the working directory.\n\
         - If the answer includes an image, embed it in the JSON as a data URI ('data:image/png;base64,...') no larger than {image} bytes.\n\
         - Never call a language model or AI service from the script.",
        script = config.script_name,
        libraries = config.allowed_libraries.join(", "),
        image = config.max_image_bytes,
    )
}

/// User prompt for the first attempt.
pub fn initial_prompt(question: &str, files: &[String], attachments: &[AttachmentSummary]) -> String {
    let mut prompt = String::new();
    prompt.push_str("Contents of questions.txt:\n\n");
    prompt.push_str("---- BEGIN questions.txt ----\n");
    prompt.push_str(question.trim_end());
    prompt.push_str("\n---- END questions.txt ----\n\n");
    prompt.push_str(&format!("Uploaded files: {}\n", files.join(", ")));

    if !attachments.is_empty() {
        prompt.push_str("\nAttachment details:\n");
        for attachment in attachments {
            prompt.push_str(&format!(
                "- {} ({} bytes)\n",
                attachment.name, attachment.size_bytes
            ));
            if let Some(preview) = &attachment.preview {
                prompt.push_str("  first lines:\n");
                for line in preview.lines() {
                    prompt.push_str("    ");
                    prompt.push_str(line);
                    prompt.push('\n');
                }
            }
        }
    }

    prompt.push_str(
        "\nWrite one Python script that reads the files in the current directory, answers every question, \
         and prints the result as JSON to stdout. It must work with the uploaded files as they are. \
         Follow the constraints from the system message.",
    );
    prompt
}

/// Feedback prompt asking for a corrected script after a failed attempt.
pub fn repair_prompt(
    attempt: u32,
    output: &ScriptOutput,
    failure: &AttemptFailure,
    previous_script: &str,
) -> String {
    format!(
        "Attempt {attempt} failed: {failure}.\n\
         Exit code: {code}\n\
         STDOUT:\n{stdout}\n\n\
         STDERR:\n{stderr}\n\n\
         The script that was run is between the === lines. Fix it and reply with ONLY the corrected Python script \
         (no explanation, no markdown fences).\n\
         ===\n{previous_script}\n===\n",
        code = output.exit_code,
        stdout = output.stdout,
        stderr = output.stderr,
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn system_prompt_carries_constraints() {
        let config = ExecutionConfig::default();
        let prompt = system_prompt(&config);
        assert!(prompt.contains("task_script.py"));
        assert!(prompt.contains("pandas, numpy"));
        assert!(prompt.contains("120 seconds"));
        assert!(prompt.contains("100000 bytes"));
    }

    #[test]
    fn initial_prompt_lists_files_and_previews() {
        let attachments = vec![AttachmentSummary {
            name: "data.csv".into(),
            size_bytes: 12,
            preview: Some("a,b\n1,2".into()),
        }];
        let files = vec!["questions.txt".to_string(), "data.csv".to_string()];
        let prompt = initial_prompt("How many rows?\n", &files, &attachments);

        assert!(prompt.contains("How many rows?\n---- END questions.txt"));
        assert!(prompt.contains("Uploaded files: questions.txt, data.csv"));
        assert!(prompt.contains("- data.csv (12 bytes)"));
        assert!(prompt.contains("    a,b\n    1,2\n"));
    }

    #[test]
    fn repair_prompt_embeds_evidence() {
        let output = ScriptOutput {
            exit_code: 1,
            stdout: "partial".into(),
            stderr: "Traceback: KeyError 'x'".into(),
            timed_out: false,
        };
        let prompt = repair_prompt(2, &output, &AttemptFailure::NonZeroExit(1), "print(df['x'])");

        assert!(prompt.starts_with("Attempt 2 failed"));
        assert!(prompt.contains("Exit code: 1"));
        assert!(prompt.contains("STDOUT:\npartial"));
        assert!(prompt.contains("STDERR:\nTraceback: KeyError 'x'"));
        assert!(prompt.contains("===\nprint(df['x'])\n==="));
    }
}
