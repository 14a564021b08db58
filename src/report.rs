use pixtrace::VectorizeError;

pub fn report_error(err: &VectorizeError) {
    match err {
        VectorizeError::InvalidConfig { field, reason } => {
            eprintln!("Invalid option `{field}`: {reason}");
            eprintln!();
            eprintln!("Run with --help to see accepted values.");
        }
        VectorizeError::Image(inner) => {
            eprintln!("Could not read or write image: {inner}");
        }
        _ => {
            eprintln!("{err}");
        }
    }
}
