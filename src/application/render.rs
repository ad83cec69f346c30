//! Template rendering against cached, compiled layouts.
//!
//! Resolution is two-stage through the layout cache: the named source text
//! (loaded from the layout library on miss), then the compiled form keyed by
//! the content fingerprint of that text. Unresolved placeholders render as
//! empty strings, matching the templating convention the display layouts are
//! written against.

use std::sync::Arc;

use handlebars::{Handlebars, handlebars_helper};
use serde::Serialize;
use thiserror::Error;
use tracing::debug;

use crate::cache::{LayoutStore, fingerprint};
use crate::config::Delimiters;
use crate::infra::layouts::{LayoutError, LayoutLibrary};
use crate::util::{dates, text};

const SOURCE: &str = "application::render";

/// Name under which each compiled layout registers its single template.
const TEMPLATE_NAME: &str = "layout";

#[derive(Debug, Error)]
pub enum RenderError {
    #[error(transparent)]
    Layout(#[from] LayoutError),
    #[error("failed to compile layout `{name}`: {source}")]
    Compile {
        name: String,
        source: Box<handlebars::TemplateError>,
    },
    #[error("failed to render layout `{name}`: {source}")]
    Render {
        name: String,
        source: handlebars::RenderError,
    },
}

handlebars_helper!(format_date: |value: str| {
    dates::format_date(value).unwrap_or_else(|| value.to_string())
});
handlebars_helper!(format_date_time: |value: str| {
    dates::format_date_time(value).unwrap_or_else(|| value.to_string())
});
handlebars_helper!(day_of: |value: str| {
    dates::day(value).unwrap_or_else(|| value.to_string())
});
handlebars_helper!(month_of: |value: str| {
    dates::month(value).unwrap_or_else(|| value.to_string())
});
handlebars_helper!(year_of: |value: str| {
    dates::year(value).unwrap_or_else(|| value.to_string())
});
// Accepts a number or a numeric string so it composes with `day`.
handlebars_helper!(ordinal_of: |n: Json| {
    match n.as_u64().or_else(|| n.as_str().and_then(|s| s.parse().ok())) {
        Some(value) => dates::ordinal(value as u32),
        None => n.to_string(),
    }
});
handlebars_helper!(concat_address: |a: str, b: str| text::join_readable(a, b));

fn base_registry() -> Handlebars<'static> {
    let mut registry = Handlebars::new();
    registry.register_helper("formatDate", Box::new(format_date));
    registry.register_helper("formatDateTime", Box::new(format_date_time));
    registry.register_helper("day", Box::new(day_of));
    registry.register_helper("month", Box::new(month_of));
    registry.register_helper("year", Box::new(year_of));
    registry.register_helper("ordinal", Box::new(ordinal_of));
    registry.register_helper("concatAddress", Box::new(concat_address));
    registry
}

/// The invocable form of a layout source, cached by content fingerprint.
///
/// Each compiled layout is a self-contained template registry, so rendering
/// needs no shared mutable state and clones share one compiled form.
#[derive(Clone)]
pub struct CompiledLayout {
    fingerprint: Arc<str>,
    registry: Arc<Handlebars<'static>>,
}

impl CompiledLayout {
    pub fn compile(fingerprint: &str, source: &str) -> Result<Self, Box<handlebars::TemplateError>> {
        let mut registry = base_registry();
        registry
            .register_template_string(TEMPLATE_NAME, source)
            .map_err(Box::new)?;
        Ok(Self {
            fingerprint: Arc::from(fingerprint),
            registry: Arc::new(registry),
        })
    }

    pub fn render<T: Serialize>(&self, data: &T) -> Result<String, handlebars::RenderError> {
        self.registry.render(TEMPLATE_NAME, data)
    }

    pub fn fingerprint(&self) -> &str {
        &self.fingerprint
    }

    /// Whether two handles point at the same compiled form.
    pub fn shares_identity_with(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.registry, &other.registry)
    }
}

/// Rewrite the configured placeholder markers to the template engine's
/// markers before compilation. Literal engine markers already present in the
/// source are escaped so they survive rendering untouched.
fn translate_delimiters(source: &str, delimiters: &Delimiters) -> String {
    if delimiters.open == "{{" && delimiters.close == "}}" {
        return source.to_string();
    }
    source
        .replace("{{", "\\{{")
        .replace(&delimiters.open, "{{")
        .replace(&delimiters.close, "}}")
}

/// Merges field sets into named layouts, consulting the layout cache and
/// falling back to the layout library on miss.
pub struct TemplateRenderer {
    store: Arc<LayoutStore>,
    library: Arc<LayoutLibrary>,
    delimiters: Delimiters,
}

impl TemplateRenderer {
    pub fn new(store: Arc<LayoutStore>, library: Arc<LayoutLibrary>, delimiters: Delimiters) -> Self {
        Self {
            store,
            library,
            delimiters,
        }
    }

    pub async fn render<T: Serialize>(
        &self,
        layout_name: &str,
        data: &T,
    ) -> Result<String, RenderError> {
        let source = self.source(layout_name).await?;
        let compiled = self.compiled(layout_name, &source)?;
        compiled.render(data).map_err(|source| RenderError::Render {
            name: layout_name.to_string(),
            source,
        })
    }

    async fn source(&self, name: &str) -> Result<String, RenderError> {
        if let Some(text) = self.store.get_source(name) {
            debug!(
                target = SOURCE,
                op = "source",
                result = "cache_hit",
                layout = name,
                "Layout source served from cache"
            );
            return Ok(text);
        }
        let text = self.library.load(name).await?;
        self.store.set_source(name, text.clone());
        debug!(
            target = SOURCE,
            op = "source",
            result = "cache_miss",
            layout = name,
            bytes = text.len(),
            "Layout source loaded from storage"
        );
        Ok(text)
    }

    fn compiled(&self, name: &str, source: &str) -> Result<CompiledLayout, RenderError> {
        let key = fingerprint(source);
        if let Some(layout) = self.store.get_compiled(&key) {
            debug!(
                target = SOURCE,
                op = "compile",
                result = "cache_hit",
                layout = name,
                fingerprint = %key,
                "Compiled layout served from cache"
            );
            return Ok(layout);
        }
        let translated = translate_delimiters(source, &self.delimiters);
        let layout =
            CompiledLayout::compile(&key, &translated).map_err(|source| RenderError::Compile {
                name: name.to_string(),
                source,
            })?;
        self.store.set_compiled(&key, layout.clone());
        debug!(
            target = SOURCE,
            op = "compile",
            result = "cache_miss",
            layout = name,
            fingerprint = %key,
            "Layout compiled and cached"
        );
        Ok(layout)
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use crate::cache::CacheConfig;

    use super::*;

    fn custom_delimiters() -> Delimiters {
        Delimiters {
            open: "<%".to_string(),
            close: "%>".to_string(),
        }
    }

    async fn renderer_with_layout(
        name: &str,
        body: &str,
    ) -> (TemplateRenderer, Arc<LayoutStore>, tempfile::TempDir) {
        let dir = tempfile::tempdir().expect("temp dir");
        tokio::fs::write(dir.path().join(format!("{name}.html")), body)
            .await
            .expect("write layout");
        let store = Arc::new(LayoutStore::new(&CacheConfig::default()));
        let library = Arc::new(LayoutLibrary::new(dir.path()));
        (
            TemplateRenderer::new(store.clone(), library, custom_delimiters()),
            store,
            dir,
        )
    }

    #[test]
    fn translates_custom_markers() {
        let translated = translate_delimiters("<p><%nameOfPerson%></p>", &custom_delimiters());
        assert_eq!(translated, "<p>{{nameOfPerson}}</p>");
    }

    #[test]
    fn escapes_literal_engine_markers() {
        let translated = translate_delimiters("{{notAField}} <%issuer%>", &custom_delimiters());
        assert_eq!(translated, "\\{{notAField}} {{issuer}}");
    }

    #[test]
    fn default_markers_pass_through() {
        let default = Delimiters {
            open: "{{".to_string(),
            close: "}}".to_string(),
        };
        assert_eq!(
            translate_delimiters("{{nameOfPerson}}", &default),
            "{{nameOfPerson}}"
        );
    }

    #[tokio::test]
    async fn renders_fields_into_layout() {
        let (renderer, _store, _dir) =
            renderer_with_layout("diploma", "<h1><%nameOfPerson%></h1><p><%university%></p>").await;
        let markup = renderer
            .render("diploma", &json!({"nameOfPerson": "Ada", "university": "UAE"}))
            .await
            .expect("renders");
        assert_eq!(markup, "<h1>Ada</h1><p>UAE</p>");
    }

    #[tokio::test]
    async fn unresolved_placeholders_render_empty() {
        let (renderer, _store, _dir) =
            renderer_with_layout("diploma", "<p><%missingField%></p>").await;
        let markup = renderer
            .render("diploma", &json!({"nameOfPerson": "Ada"}))
            .await
            .expect("lenient rendering");
        assert_eq!(markup, "<p></p>");
    }

    #[tokio::test]
    async fn warm_cache_rendering_is_idempotent() {
        let (renderer, store, _dir) =
            renderer_with_layout("diploma", "<p><%issuer%> / <%formatDate issuanceDate%></p>")
                .await;
        let data = json!({"issuer": "did:web:x", "issuanceDate": "2023-01-05T00:00:00Z"});
        let first = renderer.render("diploma", &data).await.expect("first");
        let second = renderer.render("diploma", &data).await.expect("second");
        assert_eq!(first, second);
        assert_eq!(first, "<p>did:web:x / 05-Jan-2023</p>");
        assert_eq!(store.compiled_len(), 1);
    }

    #[tokio::test]
    async fn identical_sources_under_different_names_compile_once() {
        let dir = tempfile::tempdir().expect("temp dir");
        let body = "<p><%nameOfPerson%></p>";
        tokio::fs::write(dir.path().join("first.html"), body)
            .await
            .expect("write first");
        tokio::fs::write(dir.path().join("second.html"), body)
            .await
            .expect("write second");
        let store = Arc::new(LayoutStore::new(&CacheConfig::default()));
        let library = Arc::new(LayoutLibrary::new(dir.path()));
        let renderer = TemplateRenderer::new(store.clone(), library, custom_delimiters());

        let data = json!({"nameOfPerson": "Ada"});
        renderer.render("first", &data).await.expect("first name");
        renderer.render("second", &data).await.expect("second name");

        assert_eq!(store.source_len(), 2);
        assert_eq!(store.compiled_len(), 1);
    }

    #[tokio::test]
    async fn changed_bytes_produce_a_distinct_compiled_form() {
        let store = Arc::new(LayoutStore::new(&CacheConfig::default()));
        let one = fingerprint("<p>one</p>");
        let two = fingerprint("<p>two</p>");
        assert_ne!(one, two);

        store.set_compiled(&one, CompiledLayout::compile(&one, "<p>one</p>").unwrap());
        store.set_compiled(&two, CompiledLayout::compile(&two, "<p>two</p>").unwrap());
        let first = store.get_compiled(&one).unwrap();
        let second = store.get_compiled(&two).unwrap();
        assert!(!first.shares_identity_with(&second));
    }

    #[tokio::test]
    async fn helper_suite_is_available_to_layouts() {
        let (renderer, _store, _dir) = renderer_with_layout(
            "helpers",
            "<%ordinal 21%>|<%ordinal (day issuanceDate)%>|<%month issuanceDate%>|<%year issuanceDate%>|<%concatAddress street city%>",
        )
        .await;
        let data = json!({
            "issuanceDate": "2023-01-05T00:00:00Z",
            "street": "Unit 4",
            "city": "Springfield"
        });
        let markup = renderer.render("helpers", &data).await.expect("renders");
        assert_eq!(markup, "21st|5th|Jan|2023|Unit 4, Springfield");
    }
}
