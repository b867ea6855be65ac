//! The instruction template sent to the generative model.
//!
//! The three numbered requirements at the end of the template are a contract
//! with [`crate::pipeline::materialize`]: formula spans are found by splitting
//! on `$$`, so the model must wrap every formula in `$$…$$` and emit nothing
//! else that looks like markup.

/// Substitution slot for the source exam.
pub const CONTEXT_SLOT: &str = "{CONTEXT}";

/// Context used when the source exam arrives as an attached image.
pub const IMAGE_CONTEXT: &str = "Nội dung được cung cấp trong hình ảnh đính kèm.";

/// Instruction template. Contains [`CONTEXT_SLOT`] exactly once.
pub const PROMPT_TEMPLATE: &str = r#"Bạn là một trợ lý AI chuyên gia dành cho giáo viên Việt Nam. Nhiệm vụ của bạn là tạo ra một bộ câu hỏi thi mới có format, độ khó và chủ đề tương tự với đề thi gốc được cung cấp. Hãy đảm bảo các câu hỏi mới phải khác biệt, không chỉ là diễn đạt lại câu chữ từ đề gốc.

Dưới đây là nội dung đề thi gốc:
---
{CONTEXT}
---

Hãy tạo ra một bộ câu hỏi tương tự dựa trên nội dung trên.

YÊU CẦU CỰC KỲ QUAN TRỌNG:
1.  **Ngôn ngữ phải là Tiếng Việt có đầy đủ dấu.** Ví dụ: viết "Câu 10. Nếu đường thẳng d tiếp xúc với đường tròn" thay vì "Cau 10. Neu duong thang d tiep xuc voi duong tron".
2.  **Đầu ra phải là văn bản thuần túy (plain text).** Mọi công thức toán học phải được đặt trong dấu `$$`, ví dụ: `$$x^2-2x+1=0$$`.
3.  **Không sử dụng bất kỳ định dạng Markdown nào khác** như tiêu đề (`#`), in đậm (`**`), hay danh sách (`*`, `-`)."#;

/// Fill the template's single slot with `context`.
///
/// Only the slot is replaced, so a `{CONTEXT}` string inside the user's own
/// exam text is left alone.
pub fn fill_template(context: &str) -> String {
    PROMPT_TEMPLATE.replacen(CONTEXT_SLOT, context, 1)
}
