use std::borrow::Cow;

/// Exchange segment identifier ("NSE", "BSE") - mostly static constants
pub type Exchange = Cow<'static, str>;
