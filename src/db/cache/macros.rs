/// Checks the cache for `$key` and returns the hit, otherwise awaits `$block`,
/// caches its value for `$ttl` seconds in the background and returns it.
///
/// `$cache` must deref to `dyn ResponseCache`. Errors from the cache read or
/// from `$block` are propagated with `?`, so the enclosing function must
/// return `AppResult`.
///
/// # Example
/// ```rust,ignore
/// let page: CatalogPage = cached!(self.cache, key, ttl, async move {
///     fetch_page().await
/// })?;
/// ```
#[macro_export]
macro_rules! cached {
    ($cache:expr, $key:expr, $ttl:expr, $block:expr) => {{
        if let Some(cached) = $cache.get_from_cache(&$key).await? {
            Ok(cached)
        } else {
            let value = $block.await?;
            $cache.set_in_background(&$key, &value, $ttl);
            Ok(value)
        }
    }};
}
