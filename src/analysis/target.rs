//! Target-structure proposal: which microservices to build and how to ask
//! the model for them.

use serde_json::Value;

use crate::migrate::Variant;
use crate::structure::AuthCase;

/// Used when the caller gives no instruction.
pub const DEFAULT_INSTRUCTION: &str = "Use the best of your knowledge to split into microservices following the onion ring architecture. \
Each microservice should be composed of multiple projects/layers such as Domain, Application, Infrastructure, and Presentation.";

/// Extra guidance for the gRPC variant's default instruction.
const GRPC_DATA_ACCESS: &str = " Use ADO.NET with manual MySQL queries (MySqlConnection, MySqlCommand, MySqlDataReader) \
for data access instead of Entity Framework.";

/// Name of the service authentication moves into for [`AuthCase::Dedicated`].
pub const AUTH_SERVICE: &str = "AuthService";

/// The instruction to use for `variant` when none was given.
#[must_use]
pub fn instruction_or_default(instruction: Option<&str>, variant: Variant) -> String {
    match instruction.map(str::trim).filter(|s| !s.is_empty()) {
        Some(text) => text.to_string(),
        None if variant == Variant::Grpc => format!("{DEFAULT_INSTRUCTION}{GRPC_DATA_ACCESS}"),
        None => DEFAULT_INSTRUCTION.to_string(),
    }
}

/// Service names named by an instruction such as
/// `"split into orders, users and products microservices"`.
///
/// The gateway is never listed; it is always proposed separately. gRPC
/// names carry a `Grpc` suffix.
#[must_use]
pub fn parse_service_names(instruction: &str, variant: Variant) -> Vec<String> {
    let mut text = instruction.to_lowercase().replace(',', " and ");
    for noise in ["split into", "microservices", "services", "api"] {
        text = text.replace(noise, "");
    }
    let mut names: Vec<String> = Vec::new();
    for part in text.split("and") {
        let words: Vec<&str> = part
            .split_whitespace()
            .filter(|w| *w != "service" && *w != "microservice")
            .collect();
        let name = words.join(" ");
        let name = name.trim_end_matches('s');
        if name.is_empty() || name == "gateway" {
            continue;
        }
        let name = match variant {
            Variant::Rest => name.to_string(),
            Variant::Grpc => format!("{name}Grpc"),
        };
        if !names.contains(&name) {
            names.push(name);
        }
    }
    names
}

/// Fallback service names derived from analysed file paths when the
/// instruction names none.
#[must_use]
pub fn derive_service_names(paths: &[String], variant: Variant) -> Vec<String> {
    let stem = |path: &String| -> String {
        let file = path.rsplit('/').next().unwrap_or(path);
        file.split('.').next().unwrap_or(file).to_lowercase().trim_end_matches('s').to_string()
    };
    let code = paths.iter().filter(|p| is_code_path(p));
    let mut names: Vec<String> = match variant {
        Variant::Rest => code.map(stem).collect(),
        Variant::Grpc => code
            .filter(|p| {
                let lower = p.to_lowercase();
                lower.contains("entity") || lower.contains("repository")
            })
            .map(|p| format!("{}Grpc", stem(p)))
            .collect(),
    };
    names.retain(|n| !n.is_empty() && n != "Grpc");
    names.sort();
    names.dedup();
    if variant == Variant::Rest {
        names.truncate(2);
    }
    if names.is_empty() {
        names = match variant {
            Variant::Rest => vec!["default1".into(), "default2".into()],
            Variant::Grpc => vec!["productGrpc".into(), "customerGrpc".into()],
        };
    }
    names
}

fn is_code_path(path: &str) -> bool {
    let lower = path.to_lowercase();
    (lower.ends_with(".cs") || lower.ends_with(".csproj")) && !lower.contains("gateway")
}

fn auth_guidance(case: AuthCase) -> String {
    match case {
        AuthCase::None => "- No authentication is detected in the source repository.
- Do not include authentication in any microservice.
- The Gateway microservice only routes requests with Ocelot."
            .to_string(),
        AuthCase::Dedicated => format!(
            "- Authentication is implemented in a separate '{AUTH_SERVICE}' microservice with JWT support, split into \
Domain, Application, Infrastructure and Presentation projects.
- The Gateway microservice only routes requests, with no authentication logic and no Controllers/, Data/, Entities/, Models/ or Views/ folders."
        ),
        AuthCase::InGateway => "- Authentication is detected in the source but not addressed by the instruction.
- Authentication lives in the 'Gateway' microservice with JWT support: Controllers/AuthController.cs, \
Data/AuthDbContext.cs and Entities/User.cs, plus ocelot.json, appsettings.json with JWT settings, Program.cs and Gateway.csproj.
- The Gateway has no Models/ or Views/ folder."
            .to_string(),
    }
}

fn variant_guidance(variant: Variant) -> &'static str {
    match variant {
        Variant::Rest => "- Each presentation project has Controllers/, Models/ and Views/ folders; views live in Views/<Controller>/ \
and shared layouts in Views/Shared/.
- Business logic moves out of controllers into a Services/ folder.
- WebForms pages become Razor views; code-behind files become controllers; Web.config becomes appsettings.json.",
        Variant::Grpc => "- Each microservice exposes a gRPC service: Protos/<name>.proto (file_type proto), \
Services/<Name>Service.cs (file_type grpc_service_cs), a Program.cs (file_type program_cs_grpc) and a .csproj (file_type csproj_grpc).
- Data access uses ADO.NET repositories; no Entity Framework DbContext.
- .asmx, .ascx and .aspx sources are not mapped to gRPC files.",
    }
}

/// Builds the architect prompt that asks for a target structure.
#[must_use]
pub fn build_target_prompt(
    analysis: &Value,
    target_version: &str,
    instruction: &str,
    services: &[String],
    case: AuthCase,
    variant: Variant,
) -> String {
    let analysis_text = serde_json::to_string_pretty(analysis).unwrap_or_default();
    format!(
        "You are a seasoned .NET architect transforming a legacy .NET project into domain-driven microservices.
Identify service boundaries from the analysed source and design the target architecture.

### Analysed legacy structure
{analysis_text}

### Target .NET version
{target_version}

### Requirements
- Split the project as instructed: {instruction}
- Microservices: {services}, plus a 'Gateway' microservice routing with Ocelot.
- Each microservice is split into projects by layer (Domain, Application, Infrastructure, Presentation) and has a .csproj and a Program.cs.
- Every target file lists the legacy files it derives from in \"source_files\" and explains their contribution in \"description\".
- The Gateway has at least appsettings.json, Gateway.csproj, ocelot.json and Program.cs.
- Never emit empty folders.
{variant}

### Authentication
{auth}

### Output
Return ONLY a JSON object of the form:
{{\"microservices\": [{{\"name\": \"string\", \"projects\": [{{\"project_name\": \"string\", \"target_structure\": {{
  \"root\": {{\"<file>\": {{\"source_files\": [\"string\"], \"file_type\": \"string\", \"description\": \"string\", \"namespace\": \"string\"}}}},
  \"folders\": {{\"<folder>\": {{\"target_files\": {{}}, \"subfolders\": {{}}}}}}
}}}}]}}]}}",
        services = services.join(", "),
        variant = variant_guidance(variant),
        auth = auth_guidance(case),
    )
}
