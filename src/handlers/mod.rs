pub mod head;
pub mod info_refs;
pub mod rpc;

/// Headers common to every successful Git response.
pub(crate) fn no_cache_headers(builder: &mut actix_web::HttpResponseBuilder) {
    builder
        .insert_header(("Cache-Control", "no-cache, max-age=0, must-revalidate"))
        .insert_header(("Expires", "Fri, 01 Jan 1980 00:00:00 GMT"))
        .insert_header(("Pragma", "no-cache"));
}
