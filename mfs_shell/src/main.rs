mod command;
mod logging;

use std::ffi::OsStr;
use std::io::{self, BufRead, Write};
use std::path::Path;

use clap::{App, Arg};
use log::{error, info};
use mfs::{validate_name, Session};

use crate::command::Command;

fn main() {
    logging::init();
    let matches = App::new("mfs shell")
        .about("Interactive shell over a single-image filesystem")
        .arg(
            Arg::with_name("image")
                .short("i")
                .long("image")
                .takes_value(true)
                .help("Image to open before the first prompt"),
        )
        .get_matches();

    let mut session = Session::new();
    if let Some(image) = matches.value_of("image") {
        match session.open_image(Path::new(image)) {
            Ok(()) => info!("opened {} from the command line", image),
            Err(e) => println!("open error: {}", e),
        }
    }
    if let Err(e) = repl(&mut session) {
        error!("shell terminated: {}", e);
        std::process::exit(1);
    }
}

fn repl(session: &mut Session) -> io::Result<()> {
    let stdin = io::stdin();
    let stdout = io::stdout();
    let mut line = String::new();
    loop {
        let mut out = stdout.lock();
        write!(out, "mfs> ")?;
        out.flush()?;

        line.clear();
        if stdin.lock().read_line(&mut line)? == 0 {
            // end of input acts as quit
            writeln!(out)?;
            execute(session, Command::Quit, &mut out)?;
            return Ok(());
        }
        let command = match Command::parse(&line) {
            Ok(Some(command)) => command,
            Ok(None) => continue,
            Err(e) => {
                writeln!(out, "{}", e)?;
                continue;
            }
        };
        if !execute(session, command, &mut out)? {
            return Ok(());
        }
    }
}

/// Run one command, reporting failures on `out`. Returns `false` once the
/// shell should stop.
fn execute(session: &mut Session, command: Command, out: &mut impl Write) -> io::Result<bool> {
    let label = command.label();
    let quit = command == Command::Quit;
    let outcome = run(session, command, out);
    if let Err(e) = &outcome {
        writeln!(out, "{} error: {}", label, e)?;
    }
    Ok(!stops_shell(quit, &outcome))
}

/// Quit only takes effect once the open image, if any, has been written back.
fn stops_shell(quit: bool, outcome: &mfs::Result<()>) -> bool {
    quit && outcome.is_ok()
}

fn run(session: &mut Session, command: Command, out: &mut impl Write) -> mfs::Result<()> {
    match command {
        Command::Store(path) => {
            if let Some(name) = path.file_name().and_then(OsStr::to_str) {
                validate_name(name)?;
            }
            let info = session.store(&path)?;
            writeln!(out, "Reading {} bytes from {}", info.size, path.display())?;
        }
        Command::Retrieve { name, dest } => {
            validate_name(&name)?;
            let dest = dest.unwrap_or_else(|| name.clone());
            validate_name(&dest)?;
            let written = session.retrieve(&name, Some(Path::new(&dest)))?;
            writeln!(out, "Writing {} bytes to {}", written, dest)?;
        }
        Command::Delete(name) => {
            validate_name(&name)?;
            session.delete(&name)?;
            writeln!(out, "File deleted successfully.")?;
        }
        Command::List => {
            let files = session.list()?;
            if files.is_empty() {
                writeln!(out, "List: No files found.")?;
            }
            for file in files {
                writeln!(out, "{}", file)?;
            }
        }
        Command::FreeSpace => writeln!(out, "{} bytes free.", session.free_space()?)?,
        Command::Attribute { flag, name } => {
            validate_name(&name)?;
            session.attribute(&flag, &name)?;
        }
        Command::CreateImage(path) => session.create_image(&path)?,
        Command::OpenImage(path) => session.open_image(&path)?,
        Command::CloseImage => session.close_image()?,
        Command::Quit => {
            if session.is_open() {
                session.close_image()?;
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::path::PathBuf;

    struct Scratch(PathBuf);

    impl Scratch {
        fn new(label: &str) -> Self {
            let dir = std::env::temp_dir().join(format!("mfs-shell-{}-{}", label, std::process::id()));
            let _ = fs::remove_dir_all(&dir);
            fs::create_dir_all(&dir).unwrap();
            Scratch(dir)
        }

        fn path(&self, name: &str) -> String {
            self.0.join(name).display().to_string()
        }
    }

    impl Drop for Scratch {
        fn drop(&mut self) {
            let _ = fs::remove_dir_all(&self.0);
        }
    }

    fn exec(session: &mut Session, line: &str) -> String {
        let mut out = Vec::new();
        let command = Command::parse(line).unwrap().unwrap();
        execute(session, command, &mut out).unwrap();
        String::from_utf8(out).unwrap()
    }

    fn opened(scratch: &Scratch) -> Session {
        let mut session = Session::new();
        let image = scratch.path("disk.img");
        assert_eq!(exec(&mut session, &format!("createfs {}", image)), "");
        assert_eq!(exec(&mut session, &format!("open {}", image)), "");
        session
    }

    #[test]
    fn test_put_list_del() {
        let scratch = Scratch::new("put-list-del");
        let mut session = opened(&scratch);
        let source = scratch.path("a.txt");
        fs::write(&source, b"hello").unwrap();

        let empty = exec(&mut session, "df");
        assert_eq!(exec(&mut session, "list"), "List: No files found.\n");
        assert_eq!(
            exec(&mut session, &format!("put {}", source)),
            format!("Reading 5 bytes from {}\n", source)
        );
        let listing = exec(&mut session, "list");
        assert!(listing.starts_with("         5 bytes\t"));
        assert!(listing.ends_with("\ta.txt\n"));

        assert_eq!(exec(&mut session, "del a.txt"), "File deleted successfully.\n");
        assert_eq!(exec(&mut session, "df"), empty);
        assert!(exec(&mut session, "quit").is_empty());
        assert!(!session.is_open());
    }

    #[test]
    fn test_errors_are_reported() {
        let scratch = Scratch::new("errors");
        let mut session = Session::new();
        assert_eq!(exec(&mut session, "df"), "df error: No file system image is open\n");

        let mut session = opened(&scratch);
        assert_eq!(exec(&mut session, "get ghost"), "get error: File not found: ghost\n");
        assert_eq!(exec(&mut session, "del ghost"), "del error: File not found: ghost\n");
        assert_eq!(
            exec(&mut session, "del bad/name"),
            "del error: File name is not valid ('/' not allowed): bad/name\n"
        );
        let long = "x".repeat(33);
        assert_eq!(
            exec(&mut session, &format!("del {}", long)),
            format!("del error: File name too long (limit 32): {}\n", long)
        );
    }

    #[test]
    fn test_attrib_hides_from_list() {
        let scratch = Scratch::new("attrib");
        let mut session = opened(&scratch);
        let source = scratch.path("c.txt");
        fs::write(&source, b"c").unwrap();
        exec(&mut session, &format!("put {}", source));

        assert_eq!(exec(&mut session, "attrib +h c.txt"), "");
        assert_eq!(exec(&mut session, "list"), "List: No files found.\n");
        assert_eq!(exec(&mut session, "attrib -h c.txt"), "");
        assert!(exec(&mut session, "list").ends_with("\tc.txt\n"));
        assert!(exec(&mut session, "attrib +z c.txt").starts_with("attrib error: Input is incorrect"));
    }

    #[test]
    fn test_failed_close_keeps_shell_running() {
        let failed: mfs::Result<()> = Err(mfs::FsError::Io(io::ErrorKind::Other.into()));
        assert!(!stops_shell(true, &failed));
        assert!(stops_shell(true, &Ok(())));
        assert!(!stops_shell(false, &Ok(())));
        assert!(!stops_shell(false, &failed));
    }

    #[test]
    fn test_quit_without_image() {
        let mut session = Session::new();
        let mut out = Vec::new();
        assert!(!execute(&mut session, Command::Quit, &mut out).unwrap());
        assert!(out.is_empty());
    }

    #[test]
    fn test_quit_writes_back() {
        let scratch = Scratch::new("quit");
        let mut session = opened(&scratch);
        let source = scratch.path("kept");
        fs::write(&source, b"kept").unwrap();
        exec(&mut session, &format!("put {}", source));
        exec(&mut session, "quit");

        let mut session = Session::new();
        exec(&mut session, &format!("open {}", scratch.path("disk.img")));
        assert!(exec(&mut session, "list").ends_with("\tkept\n"));
    }
}
