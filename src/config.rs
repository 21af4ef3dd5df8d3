/// The default name of the input file if none is provided.
#[cfg(not(debug_assertions))]
pub static DEFAULT_INPUT_NAME: &str = "main.bf";

/// The default name of the input file if none is provided. For debug builds,
/// we use a different default input file that is located in the `tests`
/// directory, so that `cargo run` compiles `tests/main.bf` without any
/// additional arguments.
#[cfg(debug_assertions)]
pub static DEFAULT_INPUT_NAME: &str = "tests/main.bf";

/// The default name of the output file. Assemblers conventionally take `.il`
/// files as input.
pub static DEFAULT_OUTPUT_NAME: &str = "a.il";

/// The default name of the generated assembly. The module is named after it,
/// with an `.exe` extension.
pub static DEFAULT_ASSEMBLY_NAME: &str = "program";
