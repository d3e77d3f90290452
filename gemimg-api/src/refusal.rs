//! Translation of Gemini refusal messages for the chat audience.
//!
//! The model refuses in English; the plugin's users chat in Chinese. This
//! maps the common refusal shapes to a presentable notice and passes
//! anything unrecognized through unchanged.

/// Translate a refusal/filter message into a user-facing Chinese notice.
pub fn translate_refusal(text: &str) -> String {
    if text.contains("IMAGE_SAFETY") {
        return "抱歉，您的请求可能违反了内容安全政策，无法生成或编辑图片。请尝试修改您的描述，提供更为安全、合规的内容。".into();
    }

    if text.contains("finishReason") {
        return "抱歉，图片处理失败，请尝试其他描述或稍后再试。".into();
    }

    if text.contains("I'm unable to create this image") {
        if text.contains("sexually suggestive") {
            return "抱歉，我无法创建这张图片。我不能生成带有性暗示或促进有害刻板印象的内容。请提供其他描述。".into();
        }
        if text.contains("harmful") || text.contains("dangerous") {
            return "抱歉，我无法创建这张图片。我不能生成可能有害或危险的内容。请提供其他描述。".into();
        }
        if text.contains("violent") {
            return "抱歉，我无法创建这张图片。我不能生成暴力或血腥的内容。请提供其他描述。".into();
        }
        return "抱歉，我无法创建这张图片。请尝试修改您的描述，提供其他内容。".into();
    }

    if text.contains("cannot generate") || text.contains("can't generate") {
        return "抱歉，我无法生成符合您描述的图片。请尝试其他描述。".into();
    }

    if text.contains("against our content policy") {
        return "抱歉，您的请求违反了内容政策，无法生成相关图片。请提供其他描述。".into();
    }

    text.to_string()
}
