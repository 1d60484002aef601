// <auto-generated/>
// Compiled by stencil from `Greeting.stencil`. Do not edit.

pub mod fixtures {
    #[allow(unused_imports)]
    pub(crate) use stencil_runtime::prelude::*;

    /// Template compiled from `Greeting.stencil`.
    #[allow(dead_code, non_camel_case_types, non_snake_case)]
    pub(crate) struct Greeting {
        base: HtmlTemplate<String>,
    }

    impl Greeting {
        /// Builds the template around an existing base.
        pub(crate) fn from_base(base: HtmlTemplate<String>) -> Self {
            Greeting { base }
        }

        fn kind(&self) -> &'static str {
            "warm"
        }
    }

    impl ::std::ops::Deref for Greeting {
        type Target = HtmlTemplate<String>;

        fn deref(&self) -> &Self::Target {
            &self.base
        }
    }

    impl ::std::ops::DerefMut for Greeting {
        fn deref_mut(&mut self) -> &mut Self::Target {
            &mut self.base
        }
    }

    impl ::std::default::Default for Greeting {
        fn default() -> Self {
            Self::from_base(::std::default::Default::default())
        }
    }

    impl ToValue for Greeting {
        fn to_value(&self) -> Value<'_> {
            Value::Template(self)
        }
    }

    impl Template for Greeting {
        fn content_kind(&self) -> ContentKind {
            TemplateBase::content_kind(&self.base)
        }

        #[allow(unused_braces, unused_parens, unused_mut, unused_variables, unreachable_code)]
        fn execute<'s: 'c, 'c>(
            &'s self,
            cx: &'c mut Context<'s>,
        ) -> LocalBoxFuture<'c, Result<(), RenderError>> {
            async move {
                cx.write_literal("<p");
                cx.begin_write_attribute("class", " class=\"", "\"", 2)?;
                cx.write_attribute_value("", "greeting ", true).await?;
                {
                    let __value = (self.kind());
                    cx.write_attribute_value("", &__value, false).await?;
                }
                cx.end_write_attribute()?;
                cx.write_literal(">Hello, ");
                {
                    let __value = (self.model()?);
                    cx.write(&__value).await?;
                }
                cx.write_literal("!</p>\n");
                cx.define_section("Footer", move |mut cx: Writer| {
                    async move {
                        cx.write_literal("<i>bye</i>");
                        Ok::<_, RenderError>(cx)
                    }
                    .boxed_local()
                })?;
                Ok::<(), RenderError>(())
            }
            .boxed_local()
        }
    }
}

// forwarded template constructors
const _: () = {
    #[allow(unused_imports)]
    use self::fixtures::*;

    impl Greeting {
        /// Construye la base con un modelo.
        pub(crate) fn new(model: String) -> Self {
            Self::from_base(<HtmlTemplate<String>>::new(model))
        }
    }
};
