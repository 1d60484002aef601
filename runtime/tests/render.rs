use std::{cell::Cell, fmt};

use stencil_runtime::prelude::*;

struct Literals;

impl Template for Literals {
    fn execute<'s: 'c, 'c>(
        &'s self,
        cx: &'c mut Context<'s>,
    ) -> LocalBoxFuture<'c, Result<(), RenderError>> {
        async move {
            cx.write_literal("<ul>\n");
            cx.write_literal("    <li>one & two</li>\n");
            cx.write_literal("</ul>");
            Ok::<(), RenderError>(())
        }
        .boxed_local()
    }
}

#[test]
fn literal_only_is_concatenation() {
    let template = Literals;
    let expected = "<ul>\n    <li>one & two</li>\n</ul>";

    assert_eq!(template.render().unwrap(), expected);
    assert_eq!(template.render().unwrap(), expected);
}

struct Greeting<'a> {
    name: &'a str,
    count: u32,
    safe: Encoded,
    missing: Option<String>,
}

impl Template for Greeting<'_> {
    fn execute<'s: 'c, 'c>(
        &'s self,
        cx: &'c mut Context<'s>,
    ) -> LocalBoxFuture<'c, Result<(), RenderError>> {
        async move {
            cx.write_literal("<p>");
            cx.write(self.name).await?;
            cx.write_literal(" x");
            cx.write(&self.count).await?;
            cx.write_literal(" ");
            cx.write(&self.safe).await?;
            cx.write(&self.missing).await?;
            cx.write_literal("</p>");
            Ok::<(), RenderError>(())
        }
        .boxed_local()
    }
}

#[test]
fn expressions_are_encoded_once() {
    let template = Greeting {
        name: "Tom & \"Jerry\" <'s>",
        count: 3,
        safe: raw("<b>&amp;</b>"),
        missing: None,
    };

    assert_eq!(
        template.render().unwrap(),
        "<p>Tom &amp; &quot;Jerry&quot; &lt;&#x27;s&gt; x3 <b>&amp;</b></p>"
    );
}

#[test]
fn encoding_asymmetry() {
    // Contenido marcado como seguro no se vuelve a codificar, texto crudo sí
    let already = Encoded::encode("a & b");
    let template = Greeting {
        name: already.as_str(),
        count: 0,
        safe: already.clone(),
        missing: Some(String::new()),
    };

    assert_eq!(
        template.render().unwrap(),
        "<p>a &amp;amp; b x0 a &amp; b</p>"
    );
}

struct Plain {
    base: PlainTextTemplate<&'static str>,
}

impl Template for Plain {
    fn content_kind(&self) -> ContentKind {
        TemplateBase::content_kind(&self.base)
    }

    fn execute<'s: 'c, 'c>(
        &'s self,
        cx: &'c mut Context<'s>,
    ) -> LocalBoxFuture<'c, Result<(), RenderError>> {
        async move {
            let model = self.base.model()?;
            cx.write_literal("Dear ");
            cx.write(*model).await?;
            Ok::<(), RenderError>(())
        }
        .boxed_local()
    }
}

#[test]
fn plain_text_is_not_encoded() {
    let template = Plain {
        base: PlainTextTemplate::new("<Ana & Luis>"),
    };

    assert_eq!(template.render().unwrap(), "Dear <Ana & Luis>");
}

#[test]
fn missing_model_fails() {
    let template = Plain {
        base: PlainTextTemplate::default(),
    };

    assert!(matches!(template.render(), Err(RenderError::ModelRequired)));
}

struct Outer<'a> {
    inner: &'a Greeting<'a>,
    runs: &'a Cell<u32>,
}

impl Template for Outer<'_> {
    fn execute<'s: 'c, 'c>(
        &'s self,
        cx: &'c mut Context<'s>,
    ) -> LocalBoxFuture<'c, Result<(), RenderError>> {
        async move {
            self.runs.set(self.runs.get() + 1);
            cx.write_literal("<div>");
            cx.write(&partial(self.inner)).await?;
            cx.write_literal("</div>");
            Ok::<(), RenderError>(())
        }
        .boxed_local()
    }
}

#[test]
fn nested_templates_are_not_reencoded() {
    let inner = Greeting {
        name: "<i>",
        count: 1,
        safe: Encoded::default(),
        missing: None,
    };

    let runs = Cell::new(0);
    let outer = Outer {
        inner: &inner,
        runs: &runs,
    };

    assert_eq!(outer.render().unwrap(), "<div><p>&lt;i&gt; x1 </p></div>");
    assert_eq!(runs.get(), 1);
}

struct Flushing;

impl Template for Flushing {
    fn execute<'s: 'c, 'c>(
        &'s self,
        cx: &'c mut Context<'s>,
    ) -> LocalBoxFuture<'c, Result<(), RenderError>> {
        async move {
            cx.write_literal("head");
            cx.flush()?;
            cx.write_literal("tail");
            Ok::<(), RenderError>(())
        }
        .boxed_local()
    }
}

#[derive(Default)]
struct Chunks(Vec<String>);

impl fmt::Write for Chunks {
    fn write_str(&mut self, text: &str) -> fmt::Result {
        self.0.push(text.to_owned());
        Ok(())
    }
}

#[test]
fn flush_writes_in_order() {
    let mut sink = Chunks::default();
    Flushing
        .render_to(&mut sink, CancellationToken::new())
        .unwrap();

    assert_eq!(sink.0, vec!["head", "tail"]);
}

#[test]
fn flush_is_noop_for_strings() {
    assert_eq!(Flushing.render().unwrap(), "headtail");
}

struct FlushUnderLayout;

impl Template for FlushUnderLayout {
    fn execute<'s: 'c, 'c>(
        &'s self,
        cx: &'c mut Context<'s>,
    ) -> LocalBoxFuture<'c, Result<(), RenderError>> {
        async move {
            cx.set_layout(Literals)?;
            cx.flush()?;
            Ok::<(), RenderError>(())
        }
        .boxed_local()
    }
}

struct LayoutAfterFlush;

impl Template for LayoutAfterFlush {
    fn execute<'s: 'c, 'c>(
        &'s self,
        cx: &'c mut Context<'s>,
    ) -> LocalBoxFuture<'c, Result<(), RenderError>> {
        async move {
            cx.flush()?;
            cx.set_layout(Literals)?;
            Ok::<(), RenderError>(())
        }
        .boxed_local()
    }
}

#[test]
fn flush_conflicts_with_layout() {
    let mut sink = String::new();
    let token = CancellationToken::new();

    assert!(matches!(
        FlushUnderLayout.render_to(&mut sink, token.clone()),
        Err(RenderError::FlushWithLayout)
    ));

    assert!(matches!(
        LayoutAfterFlush.render_to(&mut sink, token),
        Err(RenderError::LayoutAfterFlush)
    ));
}

#[test]
fn user_errors_propagate() {
    struct Failing;

    impl Template for Failing {
        fn execute<'s: 'c, 'c>(
            &'s self,
            cx: &'c mut Context<'s>,
        ) -> LocalBoxFuture<'c, Result<(), RenderError>> {
            async move {
                let lookup: Result<u32, anyhow::Error> = Err(anyhow::anyhow!("lookup failed"));

                cx.write_literal("partial output");
                cx.write(&lookup?).await?;
                Ok::<(), RenderError>(())
            }
            .boxed_local()
        }
    }

    let error = Failing.render().unwrap_err();
    assert_eq!(error.to_string(), "lookup failed");
}
