//! Renders statement fragments back into SQL text for the request payload.
//!
//! Every helper borrows a scratch buffer from the [`BufferPool`] and copies the
//! finished text out, so the growing happens in a reused allocation.

use crate::buffer::BufferPool;
use std::fmt::{Display, Write};

/// Writes `items` joined by `sep`.
pub fn write_separated<W: Write, T: Display>(out: &mut W, items: &[T], sep: &str) {
    for (idx, item) in items.iter().enumerate() {
        if idx > 0 {
            let _ = out.write_str(sep);
        }
        // Writing into an in-memory buffer cannot fail.
        let _ = write!(out, "{item}");
    }
}

pub fn render<T: Display + ?Sized>(pool: &BufferPool, value: &T) -> String {
    let mut buf = pool.acquire();
    let _ = write!(buf, "{value}");
    buf.as_str().to_owned()
}

pub fn render_list<T: Display>(pool: &BufferPool, items: &[T]) -> String {
    let mut buf = pool.acquire();
    write_separated(&mut buf, items, ", ");
    buf.as_str().to_owned()
}

/// Renders `(a, b), (c, d)` for a multi-row `VALUES` list.
pub fn render_rows<T: Display>(pool: &BufferPool, rows: &[Vec<T>]) -> String {
    let mut buf = pool.acquire();
    for (idx, row) in rows.iter().enumerate() {
        if idx > 0 {
            buf.push_str(", ");
        }
        buf.push('(');
        write_separated(&mut buf, row, ", ");
        buf.push(')');
    }
    buf.as_str().to_owned()
}

pub fn render_opt<T: Display>(pool: &BufferPool, value: Option<&T>) -> String {
    value.map(|v| render(pool, v)).unwrap_or_default()
}
