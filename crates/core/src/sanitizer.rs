//! Template sanitizer: per-request parameter injection, removal of
//! annotation nodes the engine cannot execute, and a referential-integrity
//! audit of what remains.
//!
//! The three steps are public and independently usable; [`sanitize`]
//! composes them on a private copy of the caller's template.

use crate::template::{JobTemplate, Node, NodeRef};

// ---------------------------------------------------------------------------
// Node class types
// ---------------------------------------------------------------------------

/// UI-only node types with no data-flow role. The engine's API rejects
/// them ("node does not exist"), so they are pruned before submission.
pub const ANNOTATION_NODE_TYPES: &[&str] = &["Note", "MarkdownNote"];

/// Sampler node class types that receive the seed.
pub const SAMPLER_NODE_TYPES: &[&str] = &["KSampler", "KSamplerAdvanced"];

/// Text encoder class type that receives the prompt text.
const TEXT_ENCODE_CLASS: &str = "CLIPTextEncode";

/// Input names a sampler may carry its seed under, in preference order.
const SEED_INPUTS: &[&str] = &["seed", "noise_seed"];

/// Text input on a text encoder.
const TEXT_INPUT: &str = "text";

/// Sampler input wired to the negative conditioning.
const NEGATIVE_INPUT: &str = "negative";

// ---------------------------------------------------------------------------
// Data structures
// ---------------------------------------------------------------------------

/// A reference from a surviving node to a node that was pruned.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DanglingReference {
    /// Node holding the reference.
    pub node_id: String,
    /// Input name on that node.
    pub input: String,
    /// The removed target.
    pub target: NodeRef,
}

/// Observability counters for one sanitize pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SanitizeReport {
    pub nodes_before: usize,
    pub nodes_after: usize,
    /// IDs of pruned nodes, in document order.
    pub removed: Vec<String>,
    /// References to pruned nodes. Reported, never repaired.
    pub dangling: Vec<DanglingReference>,
    /// Nodes that received the prompt text.
    pub prompt_targets: Vec<String>,
    /// Nodes that received the seed.
    pub seed_targets: Vec<String>,
}

/// A template ready for submission, plus the report of how it was made.
#[derive(Debug, Clone)]
pub struct SanitizedJob {
    job: JobTemplate,
    report: SanitizeReport,
}

impl SanitizedJob {
    pub fn job(&self) -> &JobTemplate {
        &self.job
    }

    pub fn report(&self) -> &SanitizeReport {
        &self.report
    }

    pub fn into_parts(self) -> (JobTemplate, SanitizeReport) {
        (self.job, self.report)
    }

    /// JSON body for the engine's `prompt` field.
    pub fn to_json(&self) -> serde_json::Value {
        self.job.to_json()
    }
}

// ---------------------------------------------------------------------------
// Public functions
// ---------------------------------------------------------------------------

/// Produce a submission-ready job from a shared template.
///
/// Works on a deep copy; `template` is never mutated. Cannot fail on a
/// well-formed template. Dangling references are logged and returned in
/// the report but the job is still returned unchanged.
pub fn sanitize(template: &JobTemplate, prompt_text: &str, seed: u64) -> SanitizedJob {
    let mut job = template.clone();
    let nodes_before = job.len();

    let (prompt_targets, seed_targets) = inject_parameters(&mut job, prompt_text, seed);
    let removed = prune_nodes(&mut job, is_annotation);
    let dangling = audit_references(&job, &removed);

    let report = SanitizeReport {
        nodes_before,
        nodes_after: job.len(),
        removed,
        dangling,
        prompt_targets,
        seed_targets,
    };

    tracing::debug!(
        nodes_before = report.nodes_before,
        nodes_after = report.nodes_after,
        removed = ?report.removed,
        dangling = report.dangling.len(),
        "Sanitized job template",
    );

    SanitizedJob { job, report }
}

/// Write the prompt text into every positive text encoder and the seed
/// into every sampler.
///
/// Inputs currently wired to another node are left alone. Returns the IDs
/// of the nodes that received the prompt and the seed respectively.
pub fn inject_parameters(
    job: &mut JobTemplate,
    prompt_text: &str,
    seed: u64,
) -> (Vec<String>, Vec<String>) {
    let prompt_nodes = positive_text_encoders(job);
    let mut prompt_targets = Vec::with_capacity(prompt_nodes.len());
    let mut seed_targets = Vec::new();

    for node_id in prompt_nodes {
        let Some(node) = job.get_mut(&node_id) else {
            continue;
        };
        if node.reference(TEXT_INPUT).is_some() {
            tracing::warn!(node_id = %node_id, "Prompt input is wired to another node, not overriding");
            continue;
        }
        node.inputs
            .insert(TEXT_INPUT.to_string(), serde_json::Value::from(prompt_text));
        prompt_targets.push(node_id);
    }

    for (node_id, node) in job.iter_mut() {
        if !is_sampler(node) {
            continue;
        }
        let seed_input = SEED_INPUTS
            .iter()
            .find(|name| node.inputs.contains_key(**name))
            .copied()
            .unwrap_or(SEED_INPUTS[0]);
        if node.reference(seed_input).is_some() {
            tracing::warn!(node_id = %node_id, "Seed input is wired to another node, not overriding");
            continue;
        }
        node.inputs
            .insert(seed_input.to_string(), serde_json::Value::from(seed));
        seed_targets.push(node_id.clone());
    }

    (prompt_targets, seed_targets)
}

/// Remove every node matching `predicate`. Returns the removed IDs in
/// document order.
pub fn prune_nodes<F>(job: &mut JobTemplate, predicate: F) -> Vec<String>
where
    F: Fn(&Node) -> bool,
{
    let removed: Vec<String> = job
        .iter()
        .filter(|(_, node)| predicate(*node))
        .map(|(id, _)| id.clone())
        .collect();

    for id in &removed {
        job.remove(id);
    }

    removed
}

/// Scan every remaining input for references into `removed`.
///
/// Each hit is logged as a template authoring defect. The job is not
/// modified.
pub fn audit_references(job: &JobTemplate, removed: &[String]) -> Vec<DanglingReference> {
    if removed.is_empty() {
        return Vec::new();
    }

    let mut dangling = Vec::new();
    for edge in job.references() {
        if removed.iter().any(|id| *id == edge.target.node_id) {
            tracing::warn!(
                node_id = %edge.from_node,
                input = %edge.input,
                target = %edge.target.node_id,
                "Input references a removed node",
            );
            dangling.push(DanglingReference {
                node_id: edge.from_node,
                input: edge.input,
                target: edge.target,
            });
        }
    }
    dangling
}

/// Whether a node is a UI-only annotation.
pub fn is_annotation(node: &Node) -> bool {
    ANNOTATION_NODE_TYPES.contains(&node.class_type.as_str())
}

/// Whether a node is a sampler.
pub fn is_sampler(node: &Node) -> bool {
    SAMPLER_NODE_TYPES.contains(&node.class_type.as_str())
}

/// IDs of text encoders that feed positive conditioning.
///
/// A text encoder is negative when any sampler wires it into its
/// `negative` input, or when its display title mentions "negative".
/// Every other text encoder is positive.
pub fn positive_text_encoders(job: &JobTemplate) -> Vec<String> {
    let negative: Vec<String> = job
        .iter()
        .filter(|(_, node)| is_sampler(node))
        .filter_map(|(_, node)| node.reference(NEGATIVE_INPUT))
        .map(|r| r.node_id)
        .collect();

    job.iter()
        .filter(|(_, node)| node.class_type == TEXT_ENCODE_CLASS)
        .filter(|(id, node)| {
            let titled_negative = node
                .title()
                .is_some_and(|t| t.to_lowercase().contains("negative"));
            !titled_negative && !negative.contains(*id)
        })
        .map(|(id, _)| id.clone())
        .collect()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
