/// Emite una línea con la indentación actual del emisor.
macro_rules! emit {
    ($emitter:expr) => {
        $emitter.blank()
    };

    ($emitter:expr, $($format:tt)*) => {{
        $emitter.indent()?;
        writeln!($emitter.output, $($format)*)
    }};
}
