#[cfg(test)]
mod engine;
#[cfg(test)]
mod support;
