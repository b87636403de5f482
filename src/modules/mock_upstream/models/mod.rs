pub mod interaction;
pub mod stub;

pub use interaction::{InboundRequest, RecordedInteraction, Times};
pub use stub::{
    json_contains, CannedResponse, MethodMatcher, PathPattern, RequestMatcher, ResponseBody,
    StubRule,
};
