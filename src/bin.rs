use std::io::Write;

use clap::Parser;
use texfront::cli::{color, io, Cli};
use texfront::document::meta::BibDatabase;

fn main() {
    let args = Cli::parse_from(wild::args());

    let bib = match &args.bibfile {
        Some(path) => io::read_bibfile(path).unwrap_or_else(|err| {
            eprintln!("could not read bibliography file '{}': {err}", path.display());
            std::process::exit(1);
        }),
        None => BibDatabase::new(),
    };

    let sources = io::read_sources(&args.filenames).unwrap_or_else(|err| {
        eprintln!("could not read input: {err}");
        std::process::exit(1);
    });

    let mut stdout = color::stdout(args.color);
    let mut exit_code = 0;

    for source in &sources {
        match texfront::cli::convert(source, bib.clone(), args.target) {
            Ok((rendered, sink)) => {
                if args.verbose {
                    sink.write_colorized(&mut stdout).ok();
                }
                match &args.output {
                    Some(path) => {
                        if let Err(err) = std::fs::write(path, &rendered) {
                            eprintln!("could not write output to '{}': {err}", path.display());
                            exit_code = 1;
                        }
                    }
                    None => {
                        writeln!(stdout, "{rendered}").ok();
                    }
                }
            }
            Err(err) => {
                eprintln!("{err}");
                exit_code = 1;
            }
        }
    }

    std::process::exit(exit_code);
}
