use std::cell::Cell;

use stencil_runtime::{prelude::*, MAX_LAYOUT_DEPTH};

struct Layout {
    title: &'static str,
}

impl Template for Layout {
    fn execute<'s: 'c, 'c>(
        &'s self,
        cx: &'c mut Context<'s>,
    ) -> LocalBoxFuture<'c, Result<(), RenderError>> {
        async move {
            cx.write_literal("<title>");
            cx.write(self.title).await?;
            cx.write_literal("</title><main>");
            {
                let value = cx.render_body()?;
                cx.write(&value).await?;
            }
            cx.write_literal("</main><footer>");
            {
                let value = cx.render_section("footer", false).await?;
                cx.write(&value).await?;
            }
            cx.write_literal("</footer>");
            Ok::<(), RenderError>(())
        }
        .boxed_local()
    }
}

struct Page {
    layout: bool,
    footer: bool,
}

impl Template for Page {
    fn execute<'s: 'c, 'c>(
        &'s self,
        cx: &'c mut Context<'s>,
    ) -> LocalBoxFuture<'c, Result<(), RenderError>> {
        async move {
            if self.layout {
                cx.set_layout(Layout { title: "A & B" })?;
            }

            cx.write_literal("<p>body</p>");
            if self.footer {
                cx.define_section("Footer", move |mut cx: Writer| {
                    async move {
                        cx.write_literal("(c) ");
                        cx.write(&2024).await?;
                        Ok::<_, RenderError>(cx)
                    }
                    .boxed_local()
                })?;
            }

            Ok::<(), RenderError>(())
        }
        .boxed_local()
    }
}

#[test]
fn no_layout_renders_body_only() {
    let page = Page {
        layout: false,
        footer: true,
    };

    assert_eq!(page.render().unwrap(), "<p>body</p>");
}

#[test]
fn layout_substitutes_body_and_sections() {
    let page = Page {
        layout: true,
        footer: true,
    };

    assert_eq!(
        page.render().unwrap(),
        "<title>A &amp; B</title><main><p>body</p></main><footer>(c) 2024</footer>"
    );
}

#[test]
fn optional_undefined_section_is_empty() {
    let page = Page {
        layout: true,
        footer: false,
    };

    assert_eq!(
        page.render().unwrap(),
        "<title>A &amp; B</title><main><p>body</p></main><footer></footer>"
    );
}

struct Outer;

impl Template for Outer {
    fn execute<'s: 'c, 'c>(
        &'s self,
        cx: &'c mut Context<'s>,
    ) -> LocalBoxFuture<'c, Result<(), RenderError>> {
        async move {
            cx.write_literal("<outer>");
            {
                let value = cx.render_body()?;
                cx.write(&value).await?;
            }
            {
                let value = cx.render_section("extra", true).await?;
                cx.write(&value).await?;
            }
            cx.write_literal("</outer>");
            Ok::<(), RenderError>(())
        }
        .boxed_local()
    }
}

struct Inner;

impl Template for Inner {
    fn execute<'s: 'c, 'c>(
        &'s self,
        cx: &'c mut Context<'s>,
    ) -> LocalBoxFuture<'c, Result<(), RenderError>> {
        async move {
            cx.set_layout(Outer)?;
            cx.define_section("extra", |mut cx: Writer| {
                async move {
                    cx.write_literal("[extra]");
                    Ok::<_, RenderError>(cx)
                }
                .boxed_local()
            })?;

            cx.write_literal("<inner>");
            if cx.is_section_defined("scripts")? {
                let value = cx.render_section("scripts", true).await?;
                cx.write(&value).await?;
            }
            {
                let value = cx.render_body()?;
                cx.write(&value).await?;
            }
            cx.write_literal("</inner>");
            Ok::<(), RenderError>(())
        }
        .boxed_local()
    }
}

struct Leaf {
    scripts: bool,
}

impl Template for Leaf {
    fn execute<'s: 'c, 'c>(
        &'s self,
        cx: &'c mut Context<'s>,
    ) -> LocalBoxFuture<'c, Result<(), RenderError>> {
        async move {
            cx.set_layout(Inner)?;
            if self.scripts {
                cx.define_section("SCRIPTS", |mut cx: Writer| {
                    async move {
                        cx.write_literal("<script></script>");
                        Ok::<_, RenderError>(cx)
                    }
                    .boxed_local()
                })?;
            }

            cx.write_literal("leaf");
            Ok::<(), RenderError>(())
        }
        .boxed_local()
    }
}

#[test]
fn nested_layouts_compose_upwards() {
    assert_eq!(
        Leaf { scripts: false }.render().unwrap(),
        "<outer><inner>leaf</inner>[extra]</outer>"
    );

    assert_eq!(
        Leaf { scripts: true }.render().unwrap(),
        "<outer><inner><script></script>leaf</inner>[extra]</outer>"
    );
}

struct NeedsScripts;

impl Template for NeedsScripts {
    fn execute<'s: 'c, 'c>(
        &'s self,
        cx: &'c mut Context<'s>,
    ) -> LocalBoxFuture<'c, Result<(), RenderError>> {
        async move {
            let value = cx.render_section("scripts", true).await?;
            cx.write(&value).await?;
            Ok::<(), RenderError>(())
        }
        .boxed_local()
    }
}

struct WithoutScripts;

impl Template for WithoutScripts {
    fn execute<'s: 'c, 'c>(
        &'s self,
        cx: &'c mut Context<'s>,
    ) -> LocalBoxFuture<'c, Result<(), RenderError>> {
        async move {
            cx.set_layout(NeedsScripts)?;
            cx.write_literal("body");
            Ok::<(), RenderError>(())
        }
        .boxed_local()
    }
}

#[test]
fn required_undefined_section_fails() {
    match WithoutScripts.render() {
        Err(RenderError::SectionNotDefined(name)) => assert_eq!(name, "scripts"),
        other => panic!("unexpected result: {:?}", other),
    }
}

#[test]
fn layout_operations_outside_layout_fail() {
    assert!(matches!(
        NeedsScripts.render(),
        Err(RenderError::NotInLayout(_))
    ));
}

struct Redefines;

impl Template for Redefines {
    fn execute<'s: 'c, 'c>(
        &'s self,
        cx: &'c mut Context<'s>,
    ) -> LocalBoxFuture<'c, Result<(), RenderError>> {
        async move {
            cx.define_section("menu", |cx: Writer| async move { Ok::<_, RenderError>(cx) }.boxed_local())?;
            cx.define_section("MENU", |cx: Writer| async move { Ok::<_, RenderError>(cx) }.boxed_local())?;
            Ok::<(), RenderError>(())
        }
        .boxed_local()
    }
}

#[test]
fn section_names_are_case_insensitive() {
    match Redefines.render() {
        Err(RenderError::SectionRedefined(name)) => assert_eq!(name, "MENU"),
        other => panic!("unexpected result: {:?}", other),
    }
}

struct Twice;

impl Template for Twice {
    fn execute<'s: 'c, 'c>(
        &'s self,
        cx: &'c mut Context<'s>,
    ) -> LocalBoxFuture<'c, Result<(), RenderError>> {
        async move {
            for _ in 0..2 {
                let value = cx.render_section("footer", false).await?;
                cx.write(&value).await?;
            }

            Ok::<(), RenderError>(())
        }
        .boxed_local()
    }
}

struct UsesTwice;

impl Template for UsesTwice {
    fn execute<'s: 'c, 'c>(
        &'s self,
        cx: &'c mut Context<'s>,
    ) -> LocalBoxFuture<'c, Result<(), RenderError>> {
        async move {
            cx.set_layout(Twice)?;
            cx.define_section("footer", |mut cx: Writer| {
                async move {
                    cx.write_literal("f");
                    Ok::<_, RenderError>(cx)
                }
                .boxed_local()
            })?;

            Ok::<(), RenderError>(())
        }
        .boxed_local()
    }
}

#[test]
fn sections_render_once() {
    assert!(matches!(
        UsesTwice.render(),
        Err(RenderError::SectionAlreadyRendered(_))
    ));
}

struct Cyclic<'a> {
    runs: &'a Cell<usize>,
}

impl Template for Cyclic<'_> {
    fn execute<'s: 'c, 'c>(
        &'s self,
        cx: &'c mut Context<'s>,
    ) -> LocalBoxFuture<'c, Result<(), RenderError>> {
        async move {
            self.runs.set(self.runs.get() + 1);
            cx.set_layout(Cyclic { runs: self.runs })?;
            Ok::<(), RenderError>(())
        }
        .boxed_local()
    }
}

#[test]
fn layout_cycles_are_bounded() {
    let runs = Cell::new(0);
    let page = Cyclic { runs: &runs };

    assert!(matches!(
        page.render(),
        Err(RenderError::LayoutDepthExceeded(MAX_LAYOUT_DEPTH))
    ));

    assert_eq!(runs.get(), MAX_LAYOUT_DEPTH + 1);
}
