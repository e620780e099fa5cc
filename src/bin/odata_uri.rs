// Copyright 2024 OctoFHIR Team
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Command-line front end for the OData URI parser
//!
//! `odata-uri parse` resolves a request URI against a JSON model document and prints
//! the resolved path and bound clauses; `odata-uri tokens` dumps the lexer output for
//! an expression.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use octofhir_odata_uri::parser::tokenize;
use octofhir_odata_uri::{KeyConvention, ModelDocument, ODataUri, ODataUriParser, ParserSettings};

#[derive(Parser)]
#[command(name = "odata-uri")]
#[command(about = "Parse OData request URIs against a model")]
#[command(version)]
#[command(author = "OctoFHIR Team <funyloony@gmail.com>")]
struct Cli {
    /// Log resolution steps (same as RUST_LOG=debug)
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Resolve a request URI and bind its query options
    Parse {
        /// Request URI, absolute or relative to the service root
        url: String,
        /// JSON model document
        #[arg(short, long)]
        model: PathBuf,
        /// Service root the request URI lives under
        #[arg(long)]
        service_root: Option<String>,
        /// Keys are written as path segments (`People/1`)
        #[arg(long)]
        key_as_segment: bool,
        /// Maximum nesting depth for every grammar
        #[arg(long)]
        max_depth: Option<usize>,
        /// Accept `{name}` templates in the path
        #[arg(long)]
        templates: bool,
    },
    /// Print the tokens of an expression
    Tokens {
        expression: String,
    },
}

fn main() -> Result<()> {
    human_panic::setup_panic!();

    let cli = Cli::parse();
    let level = if cli.verbose { "debug" } else { "warn" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level)).init();

    match cli.command {
        Commands::Parse {
            url,
            model,
            service_root,
            key_as_segment,
            max_depth,
            templates,
        } => {
            let mut settings = ParserSettings::default();
            if key_as_segment {
                settings.key_convention = KeyConvention::KeyAsSegment;
            }
            if let Some(max_depth) = max_depth {
                settings.max_depth = max_depth;
            }
            settings.enable_uri_template_parsing = templates;
            handle_parse(&url, &model, service_root.as_deref(), settings)
        }
        Commands::Tokens { expression } => handle_tokens(&expression),
    }
}

fn handle_parse(
    url: &str,
    model_file: &Path,
    service_root: Option<&str>,
    settings: ParserSettings,
) -> Result<()> {
    let json = fs::read_to_string(model_file)
        .with_context(|| format!("reading model document '{}'", model_file.display()))?;
    let model = ModelDocument::from_json(&json)
        .and_then(ModelDocument::into_model)
        .context("loading model document")?;

    let mut parser = ODataUriParser::new(&model, settings, service_root, url)?;
    let uri = parser.parse_uri().with_context(|| format!("parsing '{url}'"))?;
    print_uri(&uri);
    Ok(())
}

fn print_uri(uri: &ODataUri) {
    println!("path: {}", uri.path);
    if let Some(target) = uri.path.target_type() {
        println!("  type: {target}");
    }
    if let Some(source) = uri.path.navigation_source() {
        println!("  navigation source: {}", source.name());
    }
    if let Some(filter) = &uri.filter {
        println!("filter: {}", filter.expression);
    }
    if let Some(order_by) = &uri.order_by {
        for item in &order_by.items {
            println!("orderby: {} {:?}", item.expression, item.direction);
        }
    }
    if let Some(select_expand) = &uri.select_expand {
        println!("select/expand: {select_expand:#?}");
    }
    if let Some(search) = &uri.search {
        println!("search: {}", search.expression);
    }
    for (name, value) in [("top", uri.top), ("skip", uri.skip)] {
        if let Some(value) = value {
            println!("{name}: {value}");
        }
    }
    if let Some(count) = uri.count {
        println!("count: {count}");
    }
    if let Some(id) = &uri.id {
        println!("id: {id}");
    }
    for (name, node) in &uri.parameter_aliases {
        println!("alias {name}: {node}");
    }
    for (name, value) in &uri.custom_query_options {
        println!("custom {name}: {value}");
    }
}

fn handle_tokens(expression: &str) -> Result<()> {
    let tokens = tokenize(expression, ParserSettings::default().max_depth)?;
    for token in tokens {
        println!("{:>4}  {:<20} {}", token.position, format!("{:?}", token.kind), token.text);
    }
    Ok(())
}
