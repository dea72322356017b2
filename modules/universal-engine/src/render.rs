use anyhow::{bail, Result};

/// A synchronous render callback: element in, markup out.
///
/// Closures `FnMut(&E) -> anyhow::Result<String>` implement it. So does
/// `Option<R>`, where `None` fails on invocation.
pub trait Render<E: ?Sized> {
    fn render(&mut self, element: &E) -> Result<String>;
}

impl<E, F> Render<E> for F
where
    E: ?Sized,
    F: FnMut(&E) -> Result<String>,
{
    fn render(&mut self, element: &E) -> Result<String> {
        self(element)
    }
}

impl<E, R> Render<E> for Option<R>
where
    E: ?Sized,
    R: Render<E>,
{
    fn render(&mut self, element: &E) -> Result<String> {
        match self {
            Some(render_fn) => render_fn.render(element),
            None => bail!("no render function provided"),
        }
    }
}
