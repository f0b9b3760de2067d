//! Dockerfile analysis
//!
//! Parses a build recipe into stages and answers the questions the engine
//! asks of it: the effective base image, the last `USER` directive, the local
//! build-context file list, and final-stage naming. Only the instructions the
//! engine consumes are modeled: `FROM`, `AS`, `ARG`, `ENV`, `USER`, `COPY`,
//! `ADD`.

use indexmap::IndexMap;
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::HashSet;

static VAR_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\$\{([A-Za-z_][A-Za-z0-9_]*)\}|\$([A-Za-z_][A-Za-z0-9_]*)")
        .expect("variable pattern is valid")
});

/// One build stage
#[derive(Debug, Clone, PartialEq)]
pub struct DockerfileStage {
    /// Zero-based position in the file
    pub index: usize,
    /// Raw base image token, possibly containing `${VAR}` references
    pub base_image: String,
    /// `AS <name>` target, if declared
    pub name: Option<String>,
    /// `ENV` assignments in order
    pub env: IndexMap<String, String>,
    /// Stage-local `ARG` declarations with optional defaults
    pub args: IndexMap<String, Option<String>>,
    /// `USER` directives in order
    pub users: Vec<String>,
    /// Local `COPY`/`ADD` sources in order (`--from` instructions excluded)
    pub copy_sources: Vec<String>,
}

/// Parsed Dockerfile
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Dockerfile {
    /// `ARG` declarations before the first `FROM`
    pub preamble_args: IndexMap<String, Option<String>>,
    pub stages: Vec<DockerfileStage>,
}

impl Dockerfile {
    /// Parse Dockerfile content. Unknown instructions are ignored.
    pub fn parse(content: &str) -> Self {
        let mut dockerfile = Dockerfile::default();

        for line in logical_lines(content) {
            let Some((keyword, rest)) = split_instruction(&line) else {
                continue;
            };

            match keyword.as_str() {
                "FROM" => {
                    let mut tokens = rest.split_whitespace().filter(|t| !t.starts_with("--"));
                    let Some(base) = tokens.next() else { continue };
                    let name = match (tokens.next(), tokens.next()) {
                        (Some(kw), Some(name)) if kw.eq_ignore_ascii_case("as") => {
                            Some(name.to_string())
                        }
                        _ => None,
                    };
                    dockerfile.stages.push(DockerfileStage {
                        index: dockerfile.stages.len(),
                        base_image: base.to_string(),
                        name,
                        env: IndexMap::new(),
                        args: IndexMap::new(),
                        users: Vec::new(),
                        copy_sources: Vec::new(),
                    });
                }
                "ARG" => {
                    let (key, default) = match rest.split_once('=') {
                        Some((k, v)) => (k.trim().to_string(), Some(unquote(v.trim()))),
                        None => (rest.trim().to_string(), None),
                    };
                    if key.is_empty() {
                        continue;
                    }
                    match dockerfile.stages.last_mut() {
                        Some(stage) => {
                            stage.args.insert(key, default);
                        }
                        None => {
                            dockerfile.preamble_args.insert(key, default);
                        }
                    }
                }
                "ENV" => {
                    if let Some(stage) = dockerfile.stages.last_mut() {
                        for (key, value) in parse_env_assignments(rest) {
                            stage.env.insert(key, value);
                        }
                    }
                }
                "USER" => {
                    if let Some(stage) = dockerfile.stages.last_mut() {
                        stage.users.push(rest.trim().to_string());
                    }
                }
                "COPY" | "ADD" => {
                    let tokens: Vec<&str> = rest.split_whitespace().collect();
                    // COPY --from pulls from another stage or image, not the
                    // local build context
                    if tokens.iter().any(|t| t.starts_with("--from=")) {
                        continue;
                    }
                    let operands: Vec<&str> =
                        tokens.iter().filter(|t| !t.starts_with("--")).copied().collect();
                    if operands.len() < 2 {
                        continue;
                    }
                    if let Some(stage) = dockerfile.stages.last_mut() {
                        for source in &operands[..operands.len() - 1] {
                            stage.copy_sources.push(unquote(source));
                        }
                    }
                }
                _ => {}
            }
        }

        dockerfile
    }

    /// Find a stage by `AS` name or numeric index.
    pub fn stage(&self, target: &str) -> Option<&DockerfileStage> {
        if let Ok(index) = target.parse::<usize>() {
            return self.stages.get(index);
        }
        self.stages
            .iter()
            .find(|s| s.name.as_deref().is_some_and(|n| n.eq_ignore_ascii_case(target)))
    }

    fn target_stage(&self, target: Option<&str>) -> Option<&DockerfileStage> {
        match target {
            Some(name) => self.stage(name),
            None => self.stages.last(),
        }
    }

    /// Resolve the effective base image for a target stage.
    ///
    /// `${VAR}` references resolve from build-args first, then preamble `ARG`
    /// defaults. When the resolved value names another stage the chain is
    /// followed; a cycle returns the unexpanded token.
    pub fn find_base_image(
        &self,
        build_args: &IndexMap<String, String>,
        target: Option<&str>,
    ) -> Option<String> {
        let stage = self.target_stage(target)?;
        let mut visited = HashSet::new();
        Some(self.resolve_base(stage, build_args, &mut visited))
    }

    fn resolve_base(
        &self,
        stage: &DockerfileStage,
        build_args: &IndexMap<String, String>,
        visited: &mut HashSet<usize>,
    ) -> String {
        if !visited.insert(stage.index) {
            return stage.base_image.clone();
        }

        let resolved = self.expand(&stage.base_image, build_args, None);
        match self.stage(&resolved) {
            Some(parent) if parent.index != stage.index => {
                self.resolve_base(parent, build_args, visited)
            }
            Some(_) => stage.base_image.clone(),
            None => resolved,
        }
    }

    /// The last `USER` directive along the target stage chain, with variable
    /// references resolved (build-args, then `ARG` defaults, then base-image
    /// environment).
    pub fn find_user_statement(
        &self,
        build_args: &IndexMap<String, String>,
        base_image_env: &IndexMap<String, String>,
        target: Option<&str>,
    ) -> Option<String> {
        let target_stage = self.target_stage(target)?;

        // Collect the chain base-most first
        let mut chain = vec![target_stage];
        let mut visited: HashSet<usize> = [target_stage.index].into_iter().collect();
        loop {
            let current = *chain.last().expect("chain is non-empty");
            let resolved = self.expand(&current.base_image, build_args, Some(base_image_env));
            match self.stage(&resolved) {
                Some(parent) if visited.insert(parent.index) => chain.push(parent),
                _ => break,
            }
        }
        chain.reverse();

        let mut last_user = None;
        for stage in chain {
            for user in &stage.users {
                last_user = Some(self.expand(user, build_args, Some(base_image_env)));
            }
        }
        last_user
    }

    /// Ordered, de-duplicated local `COPY`/`ADD` sources across all stages.
    pub fn build_context_files(&self) -> Vec<String> {
        let mut seen = HashSet::new();
        let mut files = Vec::new();
        for stage in &self.stages {
            for source in &stage.copy_sources {
                if seen.insert(source.clone()) {
                    files.push(source.clone());
                }
            }
        }
        files
    }

    /// Expand `$VAR`/`${VAR}` with precedence: build-args, preamble `ARG`
    /// defaults, then the optional base-image environment. Unresolvable
    /// references stay verbatim.
    fn expand(
        &self,
        input: &str,
        build_args: &IndexMap<String, String>,
        base_image_env: Option<&IndexMap<String, String>>,
    ) -> String {
        VAR_PATTERN
            .replace_all(input, |caps: &regex::Captures| {
                let name = caps
                    .get(1)
                    .or_else(|| caps.get(2))
                    .expect("one group always matches")
                    .as_str();

                if let Some(value) = build_args.get(name) {
                    return value.clone();
                }
                if let Some(Some(default)) = self.preamble_args.get(name) {
                    return default.clone();
                }
                if let Some(env) = base_image_env {
                    if let Some(value) = env.get(name) {
                        return value.clone();
                    }
                }
                caps.get(0).expect("whole match").as_str().to_string()
            })
            .to_string()
    }
}

/// Ensure the final stage carries an `AS` name, rewriting the content when it
/// does not.
///
/// Returns the stage name and, when a rewrite was needed, the modified
/// content. Applying the function to already-named content is a fixed point.
pub fn ensure_final_stage_name(content: &str, default_name: &str) -> (String, Option<String>) {
    let dockerfile = Dockerfile::parse(content);
    let Some(last_stage) = dockerfile.stages.last() else {
        return (default_name.to_string(), None);
    };
    if let Some(ref name) = last_stage.name {
        return (name.clone(), None);
    }

    // Locate the physical line that ends the last FROM instruction, honouring
    // line continuations
    let lines: Vec<&str> = content.lines().collect();
    let total_stages = dockerfile.stages.len();
    let mut from_count = 0;
    let mut in_from_continuation = false;
    let mut rewrite_line = None;

    for (i, line) in lines.iter().enumerate() {
        let trimmed = line.trim();

        if in_from_continuation {
            if trimmed.starts_with('#') || line.trim_end().ends_with('\\') {
                continue;
            }
            in_from_continuation = false;
            if from_count == total_stages {
                rewrite_line = Some(i);
                break;
            }
            continue;
        }

        if trimmed.is_empty() || trimmed.starts_with('#') {
            continue;
        }
        let is_from = trimmed
            .split_whitespace()
            .next()
            .is_some_and(|kw| kw.eq_ignore_ascii_case("from"));
        if !is_from {
            continue;
        }

        from_count += 1;
        if line.trim_end().ends_with('\\') {
            in_from_continuation = true;
        } else if from_count == total_stages {
            rewrite_line = Some(i);
            break;
        }
    }

    let Some(line_idx) = rewrite_line else {
        return (default_name.to_string(), None);
    };

    let mut new_lines: Vec<String> = lines.iter().map(|l| l.to_string()).collect();
    let renamed = format!("{} AS {}", new_lines[line_idx].trim_end(), default_name);
    new_lines[line_idx] = renamed;
    let mut rewritten = new_lines.join("\n");
    if content.ends_with('\n') {
        rewritten.push('\n');
    }

    (default_name.to_string(), Some(rewritten))
}

/// Strip leading `# syntax=` directives.
pub fn remove_syntax_version(content: &str) -> String {
    let mut stripped = Vec::new();
    let mut in_head = true;

    for line in content.lines() {
        if in_head {
            let trimmed = line.trim();
            if trimmed
                .strip_prefix('#')
                .map(|rest| rest.trim_start().starts_with("syntax="))
                .unwrap_or(false)
            {
                continue;
            }
            if !trimmed.is_empty() {
                in_head = false;
            }
        }
        stripped.push(line);
    }

    let mut result = stripped.join("\n");
    if content.ends_with('\n') && !result.ends_with('\n') {
        result.push('\n');
    }
    result
}

/// Join continuation lines and drop comment lines.
fn logical_lines(content: &str) -> Vec<String> {
    let mut logical = Vec::new();
    let mut current = String::new();

    for line in content.lines() {
        let trimmed = line.trim();
        if current.is_empty() && (trimmed.is_empty() || trimmed.starts_with('#')) {
            continue;
        }
        // Comment lines inside a continuation are dropped
        if !current.is_empty() && trimmed.starts_with('#') {
            continue;
        }

        let stripped = line.trim_end();
        if let Some(without_backslash) = stripped.strip_suffix('\\') {
            current.push_str(without_backslash);
            current.push(' ');
        } else {
            current.push_str(stripped);
            logical.push(std::mem::take(&mut current));
        }
    }
    if !current.is_empty() {
        logical.push(current);
    }

    logical
}

fn split_instruction(line: &str) -> Option<(String, &str)> {
    let trimmed = line.trim();
    let mut parts = trimmed.splitn(2, char::is_whitespace);
    let keyword = parts.next()?.to_uppercase();
    let rest = parts.next().unwrap_or("").trim();
    Some((keyword, rest))
}

/// Parse `ENV` assignments: `K=V K2="V 2"` or the legacy `ENV KEY value`.
fn parse_env_assignments(rest: &str) -> Vec<(String, String)> {
    let tokens = tokenize_respecting_quotes(rest);
    if tokens.is_empty() {
        return Vec::new();
    }

    if !tokens[0].contains('=') {
        // Legacy space-separated form assigns everything after the key
        let key = tokens[0].clone();
        let value = rest[tokens[0].len()..].trim().to_string();
        return vec![(key, unquote(&value))];
    }

    tokens
        .iter()
        .filter_map(|token| {
            token
                .split_once('=')
                .map(|(k, v)| (k.to_string(), unquote(v)))
        })
        .collect()
}

fn tokenize_respecting_quotes(input: &str) -> Vec<String> {
    let mut tokens = Vec::new();
    let mut current = String::new();
    let mut in_quotes = false;

    for c in input.chars() {
        match c {
            '"' => {
                in_quotes = !in_quotes;
                current.push(c);
            }
            c if c.is_whitespace() && !in_quotes => {
                if !current.is_empty() {
                    tokens.push(std::mem::take(&mut current));
                }
            }
            c => current.push(c),
        }
    }
    if !current.is_empty() {
        tokens.push(current);
    }

    tokens
}

fn unquote(value: &str) -> String {
    let trimmed = value.trim();
    if trimmed.len() >= 2 && trimmed.starts_with('"') && trimmed.ends_with('"') {
        trimmed[1..trimmed.len() - 1].to_string()
    } else {
        trimmed.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(pairs: &[(&str, &str)]) -> IndexMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_parse_stages() {
        let df = Dockerfile::parse(
            "ARG BASE=alpine:3.20\n\
             FROM ${BASE} AS builder\n\
             ARG VERSION\n\
             ENV CARGO_HOME=/cargo\n\
             COPY Cargo.toml Cargo.lock ./\n\
             USER build\n\
             \n\
             FROM builder AS dev\n\
             USER dev\n",
        );

        assert_eq!(df.preamble_args.get("BASE"), Some(&Some("alpine:3.20".to_string())));
        assert_eq!(df.stages.len(), 2);
        assert_eq!(df.stages[0].name.as_deref(), Some("builder"));
        assert_eq!(df.stages[0].env.get("CARGO_HOME"), Some(&"/cargo".to_string()));
        assert_eq!(df.stages[0].copy_sources, vec!["Cargo.toml", "Cargo.lock"]);
        assert_eq!(df.stages[1].base_image, "builder");
    }

    #[test]
    fn test_line_continuations() {
        let df = Dockerfile::parse("FROM alpine:3.20 \\\n    AS dev\nUSER root\n");
        assert_eq!(df.stages.len(), 1);
        assert_eq!(df.stages[0].name.as_deref(), Some("dev"));
    }

    #[test]
    fn test_find_base_image_expansion() {
        let df = Dockerfile::parse("ARG BASE=alpine:3.20\nFROM ${BASE}\n");
        assert_eq!(
            df.find_base_image(&IndexMap::new(), None).as_deref(),
            Some("alpine:3.20")
        );

        // Build-args take precedence over ARG defaults
        assert_eq!(
            df.find_base_image(&args(&[("BASE", "ubuntu:24.04")]), None)
                .as_deref(),
            Some("ubuntu:24.04")
        );
    }

    #[test]
    fn test_find_base_image_follows_stage_chain() {
        let df = Dockerfile::parse(
            "FROM node:20 AS deps\nFROM deps AS build\nFROM build AS dev\n",
        );
        assert_eq!(
            df.find_base_image(&IndexMap::new(), Some("dev")).as_deref(),
            Some("node:20")
        );
    }

    #[test]
    fn test_find_base_image_cycle_returns_unexpanded() {
        let df = Dockerfile::parse("FROM b AS a\nFROM a AS b\n");
        // Resolution enters a cycle and surfaces the raw token
        let base = df.find_base_image(&IndexMap::new(), Some("b")).unwrap();
        assert!(base == "a" || base == "b");
    }

    #[test]
    fn test_find_user_statement_last_wins() {
        let df = Dockerfile::parse(
            "FROM alpine AS base\nUSER root\nFROM base AS dev\nUSER dev\n",
        );
        assert_eq!(
            df.find_user_statement(&IndexMap::new(), &IndexMap::new(), Some("dev"))
                .as_deref(),
            Some("dev")
        );
        assert_eq!(
            df.find_user_statement(&IndexMap::new(), &IndexMap::new(), Some("base"))
                .as_deref(),
            Some("root")
        );
    }

    #[test]
    fn test_find_user_statement_resolves_variables() {
        let df = Dockerfile::parse("ARG APP_USER=app\nFROM alpine\nUSER ${APP_USER}\n");
        assert_eq!(
            df.find_user_statement(&IndexMap::new(), &IndexMap::new(), None)
                .as_deref(),
            Some("app")
        );
        assert_eq!(
            df.find_user_statement(&args(&[("APP_USER", "other")]), &IndexMap::new(), None)
                .as_deref(),
            Some("other")
        );
    }

    #[test]
    fn test_build_context_files_skip_from_stage() {
        let df = Dockerfile::parse(
            "FROM node:20 AS build\n\
             COPY package.json yarn.lock ./\n\
             FROM nginx\n\
             COPY --from=build /app/dist /usr/share/nginx/html\n\
             COPY nginx.conf /etc/nginx/\n\
             ADD assets.tar.gz /srv/\n\
             COPY package.json /dup/\n",
        );
        assert_eq!(
            df.build_context_files(),
            vec!["package.json", "yarn.lock", "nginx.conf", "assets.tar.gz"]
        );
    }

    #[test]
    fn test_ensure_final_stage_name() {
        let (name, modified) = ensure_final_stage_name("FROM x", "dev");
        assert_eq!(name, "dev");
        assert_eq!(modified.as_deref(), Some("FROM x AS dev"));

        // Fixed point: a second application changes nothing
        let (name, modified) = ensure_final_stage_name("FROM x AS dev", "dev");
        assert_eq!(name, "dev");
        assert_eq!(modified, None);
    }

    #[test]
    fn test_ensure_final_stage_name_multi_stage() {
        let content = "FROM node:20 AS build\nRUN true\nFROM nginx\nCOPY a b\n";
        let (name, modified) = ensure_final_stage_name(content, "dev");
        assert_eq!(name, "dev");
        let modified = modified.unwrap();
        assert!(modified.contains("FROM nginx AS dev"));
        assert!(modified.contains("FROM node:20 AS build"));
    }

    #[test]
    fn test_ensure_final_stage_name_with_continuation() {
        let content = "FROM --platform=linux/amd64 \\\n    alpine:3.20\n";
        let (name, modified) = ensure_final_stage_name(content, "dev");
        assert_eq!(name, "dev");
        assert_eq!(
            modified.as_deref(),
            Some("FROM --platform=linux/amd64 \\\n    alpine:3.20 AS dev\n")
        );
    }

    #[test]
    fn test_remove_syntax_version() {
        let content = "# syntax=docker/dockerfile:1\nFROM alpine\n";
        assert_eq!(remove_syntax_version(content), "FROM alpine\n");

        // Regular comments and content survive
        let content = "# regular comment\nFROM alpine\n";
        assert_eq!(remove_syntax_version(content), content);

        // Mid-file syntax-looking comments survive
        let content = "FROM alpine\n# syntax=later\n";
        assert_eq!(remove_syntax_version(content), content);
    }

    #[test]
    fn test_env_legacy_form() {
        let df = Dockerfile::parse("FROM alpine\nENV PATH /usr/local/bin:$PATH\n");
        assert_eq!(
            df.stages[0].env.get("PATH"),
            Some(&"/usr/local/bin:$PATH".to_string())
        );
    }

    #[test]
    fn test_env_quoted_values() {
        let df = Dockerfile::parse("FROM alpine\nENV GREETING=\"hello world\" LANG=C\n");
        assert_eq!(
            df.stages[0].env.get("GREETING"),
            Some(&"hello world".to_string())
        );
        assert_eq!(df.stages[0].env.get("LANG"), Some(&"C".to_string()));
    }

    #[test]
    fn test_numeric_stage_target() {
        let df = Dockerfile::parse("FROM alpine\nFROM ubuntu\n");
        assert_eq!(df.stage("0").unwrap().base_image, "alpine");
        assert_eq!(df.stage("1").unwrap().base_image, "ubuntu");
    }
}
