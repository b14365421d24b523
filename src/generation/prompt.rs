//! Prompt assembly for code generation.

use std::collections::BTreeMap;
use std::fmt::Write as _;
use std::path::Path;

use serde::Deserialize;
use tracing::{debug, warn};

use crate::error::{MigrationError, Result};
use crate::ports::FileSystem;
use crate::structure::FileType;

/// Per-file-type prompt templates, loaded from YAML of the form
/// `file_type_prompts: { controller: { prompt: "..." } }`.
#[derive(Debug, Clone, Default)]
pub struct PromptTemplates {
    templates: BTreeMap<String, String>,
}

#[derive(Deserialize)]
struct TemplateFile {
    #[serde(default)]
    file_type_prompts: BTreeMap<String, TemplateEntry>,
}

#[derive(Deserialize)]
struct TemplateEntry {
    #[serde(default)]
    prompt: String,
}

impl PromptTemplates {
    /// Parses a template document.
    ///
    /// # Errors
    ///
    /// Returns [`MigrationError::Config`] if the YAML is malformed.
    pub fn from_yaml(text: &str) -> Result<Self> {
        let file: TemplateFile = serde_yaml::from_str(text)
            .map_err(|e| MigrationError::Config(format!("invalid prompt templates: {e}")))?;
        let templates = file
            .file_type_prompts
            .into_iter()
            .filter(|(_, entry)| !entry.prompt.trim().is_empty())
            .map(|(kind, entry)| (kind, entry.prompt))
            .collect();
        Ok(Self { templates })
    }

    /// Reads and parses the template file at `path`.
    ///
    /// # Errors
    ///
    /// Returns [`MigrationError::Config`] if the file cannot be read or parsed.
    pub fn load(fs: &dyn FileSystem, path: &Path) -> Result<Self> {
        let text = fs.read_to_string(path).map_err(|e| {
            MigrationError::Config(format!("cannot read prompt templates {}: {e}", path.display()))
        })?;
        let templates = Self::from_yaml(&text)?;
        debug!(path = %path.display(), count = templates.len(), "loaded prompt templates");
        Ok(templates)
    }

    /// Number of file types with a template.
    #[must_use]
    pub fn len(&self) -> usize {
        self.templates.len()
    }

    /// Returns `true` when no templates are loaded.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.templates.is_empty()
    }

    /// The template for `file_type`, or a generic instruction when none is
    /// configured.
    #[must_use]
    pub fn template_for(&self, file_type: FileType, target_version: &str) -> String {
        if let Some(template) = self.templates.get(file_type.as_str()) {
            return template.clone();
        }
        warn!(file_type = %file_type, "no prompt template for file type, using the generic one");
        format!(
            "Generate a {file_type} file for a .NET project targeting {target_version} with appropriate SDK and build properties."
        )
    }
}

/// Replaces the `customerGrpc`/`CustomerGrpc` placeholders templates use
/// with names derived from `microservice`.
#[must_use]
pub fn customise(template: &str, microservice: &str) -> String {
    if microservice.is_empty() || microservice == "Unknown" {
        return template.to_string();
    }
    let base = microservice.replace("Grpc", "").to_lowercase();
    let mut capitalised = String::with_capacity(base.len());
    let mut chars = base.chars();
    if let Some(first) = chars.next() {
        capitalised.extend(first.to_uppercase());
        capitalised.push_str(chars.as_str());
    }
    template
        .replace("customerGrpc", &format!("{base}Grpc"))
        .replace("CustomerGrpc", &format!("{capitalised}Grpc"))
}

/// Clean-architecture layer a project belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProjectLayer {
    /// Entities and domain logic.
    Domain,
    /// Use cases and application services.
    Application,
    /// Persistence and external integrations.
    Infrastructure,
    /// API or UI host.
    Presentation,
}

impl ProjectLayer {
    /// Infers the layer from a project name such as `Orders.Domain`.
    #[must_use]
    pub fn infer(project_name: &str) -> Option<Self> {
        let lower = project_name.to_lowercase();
        if lower.contains("domain") {
            Some(Self::Domain)
        } else if lower.contains("application") {
            Some(Self::Application)
        } else if lower.contains("infrastructure") {
            Some(Self::Infrastructure)
        } else if lower.contains("presentation") {
            Some(Self::Presentation)
        } else {
            None
        }
    }

    /// Display name used in prompts.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Domain => "Domain",
            Self::Application => "Application",
            Self::Infrastructure => "Infrastructure",
            Self::Presentation => "Presentation",
        }
    }
}

/// Everything a generation prompt embeds.
#[derive(Debug, Clone, Copy)]
pub struct PromptInputs<'a> {
    /// Target file name.
    pub file_name: &'a str,
    /// Kind of file.
    pub file_type: FileType,
    /// What the file is for.
    pub description: &'a str,
    /// Extra guidance from the target structure.
    pub instructions: &'a str,
    /// Namespace the file must use; omitted when empty.
    pub namespace: &'a str,
    /// Owning microservice.
    pub microservice: &'a str,
    /// Owning project.
    pub project: &'a str,
    /// Target framework moniker, e.g. `net8.0`.
    pub target_version: &'a str,
    /// File-type template, already customised.
    pub template: &'a str,
    /// Legacy source text, or one chunk of it.
    pub source: &'a str,
    /// Retrieved target-structure snippet.
    pub context: Option<&'a str>,
    /// Retrieved source-analysis snippet.
    pub analysis: Option<&'a str>,
    /// Rendered conversation memory.
    pub memory: &'a str,
}

/// Builds the full generation prompt.
#[must_use]
pub fn build_prompt(inputs: &PromptInputs<'_>) -> String {
    let layer = ProjectLayer::infer(inputs.project).map_or("Unknown", ProjectLayer::as_str);
    let microservice = or_unknown(inputs.microservice);
    let project = or_unknown(inputs.project);
    let version = inputs.target_version;

    let mut prompt = String::new();
    if !inputs.template.is_empty() {
        let _ = write!(
            prompt,
            "{}\n\nAdditional Context:\n- Microservice Name: {microservice}\n- Project Name: {project}\n- Project Layer: {layer}\n\n",
            inputs.template
        );
    }
    let _ = write!(
        prompt,
        "Generate code for a file named {} of type {}, following these strict guidelines:

VALIDATION RULES:
1. The file must contain exactly one primary type (class, interface, or record) for C# files.
2. The namespace must reflect the project and folder structure.
3. No regions or commented-out code are allowed.
4. Follow standard .NET naming conventions.
5. Include all necessary using directives at the top.

Description: {}
Instructions: {}
Target Framework: {version}
Microservice Name: {microservice}
Project Name: {project}
Project Layer: {layer}

For csproj files: Use the computed list of dependencies to create corresponding PackageReference entries, including only packages that are not part of the default set for {version} (exclude system and default packages).

Generate clean, modern .NET code using the following principles:
- Leverage the latest C# features appropriate for the target framework.
- Follow SOLID principles and adopt clean architecture.
- Implement proper dependency injection.
- Use async/await where applicable.
- Handle errors appropriately.
- Include XML documentation for public APIs.
",
        inputs.file_name, inputs.file_type, inputs.description, inputs.instructions,
    );

    if let Some(context) = inputs.context {
        let _ = write!(prompt, "\nRelevant target structure:\n{context}\n");
    }
    if let Some(analysis) = inputs.analysis {
        let _ = write!(prompt, "\nRelevant source analysis:\n{analysis}\n");
    }
    if !inputs.memory.is_empty() {
        let _ = write!(prompt, "\nPreviously generated in this microservice:\n{}\n", inputs.memory);
    }

    let _ = write!(
        prompt,
        "
Output Requirements:
The response MUST be a valid JSON object with exactly two keys:
1. \"generated_code\": containing the generated code as a string.
2. \"dependencies\": an array of dependency names.
Do not include any extra text or commentary in the response.

Source content (if applicable):
{}",
        inputs.source
    );
    if !inputs.namespace.is_empty() {
        let _ = write!(prompt, "\nThe namespace for this file should be: {}", inputs.namespace);
    }
    prompt
}

/// Trailer appended to the prompt of chunk `index` (0-based) of `total`.
#[must_use]
pub fn chunk_suffix(index: usize, total: usize) -> String {
    format!(
        "[CHUNK CONTEXT: This is part {} of {total} of a larger file. Please generate only the code for this specific chunk. For the first chunk only, include all necessary using statements and namespace declarations at the top. For subsequent chunks, generate only the class/method content without any using statements or namespace wrappers.]",
        index + 1
    )
}

fn or_unknown(value: &str) -> &str {
    if value.is_empty() {
        "Unknown"
    } else {
        value
    }
}
