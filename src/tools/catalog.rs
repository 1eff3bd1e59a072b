//! Merge-request workflow tools
//!
//! Each tool forwards to an external program of the same name.

use super::adapter::ExternalTool;
use super::protocol::{ParameterDef, ToolDefinition};
use crate::config::ToolsConfig;
use serde_json::json;

pub const GET_DIFF: &str = "getDiff";
pub const GET_JIRA_TICKET: &str = "getJiraTicket";
pub const GET_MR: &str = "getMR";
pub const GET_MR_DIFF: &str = "getMRDiff";
pub const UPDATE_MR: &str = "updateMR";

/// Capture bound for full merge-request diffs (10 MiB)
pub const MR_DIFF_MAX_OUTPUT: usize = 10 * 1024 * 1024;

/// All tools, configured
pub fn builtin_tools(config: &ToolsConfig) -> Vec<ExternalTool> {
    vec![get_diff(), get_jira_ticket(), get_mr(), get_mr_diff(), update_mr()]
        .into_iter()
        .map(|tool| tool.configure(config))
        .collect()
}

pub fn get_diff() -> ExternalTool {
    let definition = ToolDefinition {
        name: GET_DIFF.to_string(),
        description: "Generate AI-ready diff summary between feature branch and base branch. \
                      Shows files changed, commit messages, diff stats, and code changes."
            .to_string(),
        parameters: vec![ParameterDef::optional(
            "baseBranch",
            "Base branch to compare against (default: master)",
        )
        .with_default(json!("master"))],
    };

    ExternalTool::new(definition, GET_DIFF, |cmd, args| {
        cmd.opt_ident(args.get_str("baseBranch"))
    })
}

pub fn get_jira_ticket() -> ExternalTool {
    let definition = ToolDefinition {
        name: GET_JIRA_TICKET.to_string(),
        description: "Fetch comprehensive Jira ticket details including summary, description, \
                      acceptance criteria, notes, and subtasks. Auto-extracts ticket ID from \
                      git branch name if not provided."
            .to_string(),
        parameters: vec![ParameterDef::optional(
            "ticketId",
            "Jira ticket ID (e.g., ME-123). If omitted, will auto-extract from current git \
             branch name.",
        )],
    };

    ExternalTool::new(definition, GET_JIRA_TICKET, |cmd, args| {
        cmd.opt_ident(args.get_str("ticketId"))
    })
}

pub fn get_mr() -> ExternalTool {
    let definition = ToolDefinition {
        name: GET_MR.to_string(),
        description: "Get MR number from current git branch. Finds the merge request \
                      associated with the current branch using glab CLI."
            .to_string(),
        parameters: vec![],
    };

    ExternalTool::new(definition, GET_MR, |cmd, _| cmd).trimmed()
}

pub fn get_mr_diff() -> ExternalTool {
    let definition = ToolDefinition {
        name: GET_MR_DIFF.to_string(),
        description: "Generate MR diff summary optimized for AI analysis. Retrieves MR \
                      metadata, changed files, and raw diff. If no MR number provided, \
                      automatically detects from current branch."
            .to_string(),
        parameters: vec![ParameterDef::optional(
            "mrNumber",
            "Optional: MR number to fetch. If not provided, uses MR from current branch.",
        )],
    };

    ExternalTool::new(definition, GET_MR_DIFF, |cmd, args| {
        cmd.opt_ident(args.get_str("mrNumber"))
    })
    .with_max_output(MR_DIFF_MAX_OUTPUT)
}

pub fn update_mr() -> ExternalTool {
    let definition = ToolDefinition {
        name: UPDATE_MR.to_string(),
        description: "Update GitLab MR description and optionally the title. Finds the MR for \
                      the current git branch and updates it. Requires glab CLI and an existing \
                      open MR."
            .to_string(),
        parameters: vec![
            ParameterDef::required(
                "summary",
                "The summary/description to set for the MR. Should be a comprehensive \
                 description of the changes.",
            ),
            ParameterDef::optional(
                "title",
                "Optional: The title for the MR following the pattern \
                 [type]([scope]): [TICKET-ID] [brief description]",
            ),
        ],
    };

    // Binding guarantees `summary` is present before this runs.
    ExternalTool::new(definition, UPDATE_MR, |cmd, args| {
        cmd.text(args.get_str("summary").unwrap_or_default())
            .opt_text(args.get_str("title"))
    })
}
