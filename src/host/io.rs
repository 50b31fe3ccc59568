//! `io` library and file methods

use std::cell::RefCell;
use std::rc::Rc;
use std::sync::Arc;

use tracing::debug;

use super::{fail, fail_errno, ok, scalar_text, Args, Handle, Returns, ScriptContext};
use crate::error::{BridgeError, FileError, Result};
use crate::tree::FileTree;
use crate::value::{DynamicValue, NativeFunction};
use crate::vfile::{OpenMode, ReadFormat, ReadValue, VirtualFile, Whence};

type FileRef = Rc<RefCell<VirtualFile>>;

fn open_file(ctx: &ScriptContext, path: &str, mode: OpenMode) -> std::result::Result<FileRef, FileError> {
    let tree: Arc<dyn FileTree> = Arc::clone(&ctx.tree);
    let file = VirtualFile::open(tree, &ctx.config.namespace_root, path, mode)?;
    Ok(Rc::new(RefCell::new(file)))
}

fn file_value(file: &FileRef) -> DynamicValue {
    DynamicValue::Handle(Handle::File(Rc::clone(file)))
}

/// Closed handles are a contract violation, reported against the receiver
fn ensure_open(args: &Args<'_>, file: &VirtualFile) -> Result<()> {
    if file.is_closed() {
        return Err(args.error(1, "file is closed"));
    }
    Ok(())
}

// =============================================================================
// Library functions
// =============================================================================

/// `io.open(path, mode?)`: a file handle or `nil, message, 1`
pub(super) fn open(ctx: &mut ScriptContext, args: &Args<'_>) -> Result<Returns> {
    let path = args.check_string(1)?;
    let token = args.opt_string(2)?.unwrap_or_else(|| "r".to_string());
    let mode = OpenMode::parse(&token)
        .ok_or_else(|| args.error(2, format!("invalid option '{}'", token)))?;

    match open_file(ctx, &path, mode) {
        Ok(file) => Ok(ok(file_value(&file))),
        Err(e) => {
            debug!(path = %path, error = %e, "io.open failed");
            Ok(fail_errno(e))
        }
    }
}

/// `io.close(file?)`: closes the default output when called bare
pub(super) fn close(ctx: &mut ScriptContext, args: &Args<'_>) -> Result<Returns> {
    let file = if args.is_empty() {
        default_file(args, ctx.default_output.as_ref(), "output")?
    } else {
        args.check_file(1)?
    };
    let mut file = file.borrow_mut();
    ensure_open(args, &file)?;
    file.close()?;
    Ok(ok(true))
}

/// `io.read(fmt...)` on the default input
pub(super) fn read(ctx: &mut ScriptContext, args: &Args<'_>) -> Result<Returns> {
    let file = default_file(args, ctx.default_input.as_ref(), "input")?;
    read_from(args, &file, 1)
}

/// `io.write(v...)` on the default output
pub(super) fn write(ctx: &mut ScriptContext, args: &Args<'_>) -> Result<Returns> {
    let file = default_file(args, ctx.default_output.as_ref(), "output")?;
    write_to(args, &file, 1)
}

/// `io.lines(path)`: an iterator function over the file's lines. The file
/// is closed once the iterator reaches end of file.
pub(super) fn lines(ctx: &mut ScriptContext, args: &Args<'_>) -> Result<Returns> {
    let path = args.check_string(1)?;
    match open_file(ctx, &path, OpenMode::Read) {
        Ok(file) => Ok(ok(line_iterator(file, true))),
        Err(e) => Ok(fail_errno(e)),
    }
}

/// `io.input(file|path?)`: get or replace the default input
pub(super) fn input(ctx: &mut ScriptContext, args: &Args<'_>) -> Result<Returns> {
    let file = match args.get(1) {
        DynamicValue::Nil if args.is_empty() => {
            return Ok(ok(ctx.default_input.as_ref().map(file_value).unwrap_or_default()))
        }
        DynamicValue::String(path) => open_file(ctx, path, OpenMode::Read)?,
        DynamicValue::Handle(Handle::File(file)) => Rc::clone(file),
        other => {
            return Err(args.error(1, format!("string or file expected, got {}", other.type_name())))
        }
    };
    ctx.default_input = Some(Rc::clone(&file));
    Ok(ok(file_value(&file)))
}

/// `io.output(file|path?)`: get or replace the default output
pub(super) fn output(ctx: &mut ScriptContext, args: &Args<'_>) -> Result<Returns> {
    let file = match args.get(1) {
        DynamicValue::Nil if args.is_empty() => {
            return Ok(ok(ctx.default_output.as_ref().map(file_value).unwrap_or_default()))
        }
        DynamicValue::String(path) => open_file(ctx, path, OpenMode::Write)?,
        DynamicValue::Handle(Handle::File(file)) => Rc::clone(file),
        other => {
            return Err(args.error(1, format!("string or file expected, got {}", other.type_name())))
        }
    };
    ctx.default_output = Some(Rc::clone(&file));
    Ok(ok(file_value(&file)))
}

/// `io.type(v)`: "file", "closed file" or nil
pub(super) fn io_type(args: &Args<'_>) -> Result<Returns> {
    let kind = match args.get(1) {
        DynamicValue::Handle(Handle::File(file)) => {
            if file.borrow().is_closed() {
                DynamicValue::from("closed file")
            } else {
                DynamicValue::from("file")
            }
        }
        _ => DynamicValue::Nil,
    };
    Ok(ok(kind))
}

fn default_file(args: &Args<'_>, file: Option<&FileRef>, which: &str) -> Result<FileRef> {
    file.cloned()
        .ok_or_else(|| BridgeError::Script(format!("{}: default {} file is not set", args.function(), which)))
}

// =============================================================================
// File methods
// =============================================================================

pub(super) fn file_method(method: &str, args: &Args<'_>) -> Result<Returns> {
    let file = args.check_file(1)?;
    match method {
        "read" => read_from(args, &file, 2),
        "write" => write_to(args, &file, 2),
        "seek" => seek(args, &file),
        "close" => {
            let mut file = file.borrow_mut();
            ensure_open(args, &file)?;
            file.close()?;
            Ok(ok(true))
        }
        "lines" => {
            let readable = {
                let f = file.borrow();
                ensure_open(args, &f)?;
                if f.is_readable() {
                    Ok(())
                } else {
                    Err(FileError::NotReadable(f.name().to_string()))
                }
            };
            match readable {
                Ok(()) => Ok(ok(line_iterator(file, false))),
                Err(e) => Ok(fail_errno(e)),
            }
        }
        "size" => {
            let file = file.borrow();
            ensure_open(args, &file)?;
            Ok(ok(file.size()? as f64))
        }
        "__tostring" => Ok(ok(file.borrow().to_string())),
        other => Err(BridgeError::Script(format!("attempt to call a nil value (method '{}')", other))),
    }
}

/// Parse the read formats starting at `first`; none means one line
fn read_formats(args: &Args<'_>, first: usize) -> Result<Vec<ReadFormat>> {
    if args.len() < first {
        return Ok(vec![ReadFormat::Line]);
    }
    let mut formats = Vec::new();
    for pos in first..=args.len() {
        match args.get(pos) {
            DynamicValue::Number(n) => {
                if *n < 0.0 || n.fract() != 0.0 {
                    return Err(args.error(pos, "invalid byte count"));
                }
                formats.push(ReadFormat::Count(*n as usize));
            }
            DynamicValue::String(token) => {
                let parsed = ReadFormat::parse_options(token)
                    .ok_or_else(|| args.error(pos, format!("invalid options: {}", token)))?;
                formats.extend(parsed);
            }
            other => {
                return Err(args.error(pos, format!("invalid format, got {}", other.type_name())))
            }
        }
    }
    Ok(formats)
}

fn read_from(args: &Args<'_>, file: &FileRef, first: usize) -> Result<Returns> {
    let formats = read_formats(args, first)?;
    let mut file = file.borrow_mut();
    ensure_open(args, &file)?;
    if !file.is_readable() {
        return Ok(fail_errno(FileError::NotReadable(file.name().to_string())));
    }

    let results = file
        .read_formats(&formats)?
        .into_iter()
        .map(|value| match value {
            Some(ReadValue::Number(n)) => DynamicValue::Number(n),
            Some(bytes) => DynamicValue::String(bytes.into_string()),
            None => DynamicValue::Nil,
        })
        .collect();
    Ok(results)
}

fn write_to(args: &Args<'_>, file: &FileRef, first: usize) -> Result<Returns> {
    let mut data = String::new();
    for pos in first..=args.len() {
        let text = scalar_text(args.get(pos))
            .ok_or_else(|| args.error(pos, format!("string expected, got {}", args.get(pos).type_name())))?;
        data.push_str(&text);
    }

    let mut file = file.borrow_mut();
    ensure_open(args, &file)?;
    if !file.is_writable() {
        return Ok(fail_errno(FileError::NotWritable(file.name().to_string())));
    }
    file.write(data.as_bytes())?;
    Ok(ok(true))
}

/// `file:seek(whence?, offset?)`: new position, or `nil, message` when the
/// target lies outside the file
fn seek(args: &Args<'_>, file: &FileRef) -> Result<Returns> {
    let token = args.opt_string(2)?.unwrap_or_else(|| "cur".to_string());
    let whence = Whence::parse(&token)
        .ok_or_else(|| args.error(2, format!("invalid option '{}'", token)))?;
    let offset = args.opt_integer(3, 0)?;

    let mut file = file.borrow_mut();
    ensure_open(args, &file)?;
    match file.seek(whence, offset) {
        Ok(position) => Ok(ok(position as f64)),
        Err(e @ FileError::OffsetPastEnd { .. }) | Err(e @ FileError::NegativeOffset(_)) => Ok(fail(e)),
        Err(e) => Err(e.into()),
    }
}

/// A function returning the next line on each call and Nil at end of file
fn line_iterator(file: FileRef, close_at_eof: bool) -> DynamicValue {
    let iterator = NativeFunction::new("lines", move |_args| {
        let mut file = file.borrow_mut();
        if file.is_closed() {
            return Err(FileError::HandleClosed.to_string());
        }
        match file.read_line().map_err(|e| e.to_string())? {
            Some(line) => Ok(vec![DynamicValue::String(String::from_utf8_lossy(&line).into_owned())]),
            None => {
                if close_at_eof {
                    file.close().map_err(|e| e.to_string())?;
                }
                Ok(vec![DynamicValue::Nil])
            }
        }
    });
    DynamicValue::Function(iterator)
}
